//! Release targets: configuration plus autodetected manifest data

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{config_file_names, load_config, ProjectConfig};
use crate::error::{AdapterError, ConfigError, Result};
use crate::traits::{ManifestAdapter, RegistryUrl};
use crate::types::Ecosystem;
use crate::version::Version;

/// What ordered manifest probing found
#[derive(Clone, Default)]
pub struct DetectedManifest {
    /// Adapter whose marker file exists; the one reporting a version wins
    pub adapter: Option<Arc<dyn ManifestAdapter>>,
    /// Version stored literally in the manifest
    pub version: Option<Version>,
    /// Why a detected manifest carries no literal version
    pub not_located: Option<String>,
}

impl std::fmt::Debug for DetectedManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectedManifest")
            .field("adapter", &self.adapter.as_ref().map(|a| a.name()))
            .field("version", &self.version)
            .field("not_located", &self.not_located)
            .finish()
    }
}

/// Try each adapter in priority order; the first reporting a version wins.
///
/// An adapter whose manifest exists but does not store the version is kept
/// as a fallback so its ecosystem is still known.
pub fn detect_manifest(root: &Path, adapters: &[Arc<dyn ManifestAdapter>]) -> Result<DetectedManifest> {
    let mut fallback = DetectedManifest::default();
    for adapter in adapters {
        if !adapter.detect(root) {
            continue;
        }
        match adapter.read_version(root) {
            Ok(version) => {
                debug!(adapter = adapter.name(), version = %version, "manifest version found");
                return Ok(DetectedManifest {
                    adapter: Some(Arc::clone(adapter)),
                    version: Some(version),
                    not_located: None,
                });
            }
            Err(AdapterError::VersionNotLocated { reason, .. }) => {
                debug!(adapter = adapter.name(), reason = %reason, "manifest has no literal version");
                if fallback.adapter.is_none() {
                    fallback = DetectedManifest {
                        adapter: Some(Arc::clone(adapter)),
                        version: None,
                        not_located: Some(reason),
                    };
                }
            }
            Err(AdapterError::ManifestNotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(fallback)
}

/// One release target, immutable once loaded
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub manifest: DetectedManifest,
}

impl Project {
    /// Load `disperse.toml` from `root` and detect its manifests
    pub fn load(root: &Path, adapters: &[Arc<dyn ManifestAdapter>]) -> Result<Self> {
        let config_path = config_file_names()
            .into_iter()
            .map(|name| root.join(name))
            .find(|p| p.exists())
            .ok_or_else(|| ConfigError::NotFound(root.to_path_buf()))?;
        let config = load_config(&config_path)?;
        Self::from_config(root, config, adapters)
    }

    /// Build from an already validated configuration
    pub fn from_config(
        root: &Path,
        config: ProjectConfig,
        adapters: &[Arc<dyn ManifestAdapter>],
    ) -> Result<Self> {
        let manifest = detect_manifest(root, adapters)?;
        let name = match (&config.name, &manifest.adapter) {
            (Some(name), _) => name.clone(),
            (None, Some(adapter)) => match adapter.read_project_name(root) {
                Ok(name) => name,
                Err(_) => dir_name(root),
            },
            (None, None) => dir_name(root),
        };
        info!(
            project = %name,
            ecosystem = manifest.adapter.as_ref().map(|a| a.ecosystem().as_str()).unwrap_or("none"),
            "loaded project"
        );
        Ok(Self {
            name,
            root: root.to_path_buf(),
            config,
            manifest,
        })
    }

    pub fn ecosystem(&self) -> Option<Ecosystem> {
        self.manifest.adapter.as_ref().map(|a| a.ecosystem())
    }

    /// Registries the manifest publishes to, with the repository URL it declares
    pub fn registries(&self) -> Result<Vec<RegistryUrl>> {
        match &self.manifest.adapter {
            Some(adapter) => Ok(adapter.read_registry_urls(&self.root)?),
            None => Ok(Vec::new()),
        }
    }

    /// Command to run once the manifest version has been rewritten
    pub fn refresh_command(&self) -> Option<String> {
        self.manifest.version.as_ref()?;
        self.manifest.adapter.as_ref()?.refresh_command(&self.root)
    }

    /// Absolute path of a project-relative path
    pub fn path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Manpage files matching the configured globs
    pub fn manpages(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for pattern in &self.config.update_manpage {
            let full = self.root.join(pattern);
            match glob::glob(&full.to_string_lossy()) {
                Ok(paths) => found.extend(paths.filter_map(|p| p.ok())),
                Err(_) => found.push(full),
            }
        }
        found.sort();
        found.dedup();
        found
    }

    /// Verify command from configuration, or autodetected from the tree
    pub fn verify_command(&self) -> Option<String> {
        if let Some(command) = &self.config.verify_command {
            return Some(command.clone());
        }
        if self.root.join("tox.ini").exists() {
            Some("tox".to_string())
        } else if self.root.join("Cargo.toml").exists() {
            Some("cargo test --all".to_string())
        } else {
            None
        }
    }
}

fn dir_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

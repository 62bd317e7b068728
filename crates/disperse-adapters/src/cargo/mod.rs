//! Rust crates: Cargo.toml manifests and crates.io publishing

mod manifest;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use disperse_core::config::ProjectConfig;
use disperse_core::error::AdapterError;
use disperse_core::traits::{ManifestAdapter, Publisher, RegistryUrl};
use disperse_core::types::{Ecosystem, PublishFailure, PublishOutcome};
use disperse_core::version::Version;

use crate::credentials::CredentialProvider;
use crate::publish::run_tool;
pub use manifest::{CargoToml, VersionField};

const REGISTRY: &str = "crates.io";

/// Cargo package adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct CargoAdapter;

impl CargoAdapter {
    pub fn new() -> Self {
        Self
    }

    fn manifest_path(&self, path: &Path) -> PathBuf {
        path.join("Cargo.toml")
    }

    fn load(&self, root: &Path) -> Result<CargoToml, AdapterError> {
        CargoToml::load(&self.manifest_path(root))
    }
}

impl ManifestAdapter for CargoAdapter {
    fn name(&self) -> &'static str {
        "cargo"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    fn detect(&self, root: &Path) -> bool {
        let found = self.manifest_path(root).exists();
        debug!(adapter = "cargo", path = %root.display(), found, "detecting manifest");
        found
    }

    fn manifest_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = vec![self.manifest_path(root)];
        let lock = root.join("Cargo.lock");
        if lock.exists() {
            files.push(lock);
        }
        files
    }

    fn read_version(&self, root: &Path) -> Result<Version, AdapterError> {
        let manifest = self.load(root)?;
        let (_, raw) = manifest.locate_version()?;
        raw.parse()
            .map_err(|e: disperse_core::error::VersionError| {
                AdapterError::ManifestParseError(e.to_string())
            })
    }

    #[instrument(skip_all, fields(root = %root.display(), version = %version))]
    fn write_version(&self, root: &Path, version: &Version) -> Result<(), AdapterError> {
        let mut manifest = self.load(root)?;
        let (field, _) = manifest.locate_version()?;
        manifest.set_version(field, &version.to_string())?;
        manifest.save()?;
        info!(adapter = "cargo", ?field, "updated Cargo.toml");
        Ok(())
    }

    fn refresh_command(&self, root: &Path) -> Option<String> {
        root.join("Cargo.lock")
            .exists()
            .then(|| "cargo update --workspace".to_string())
    }

    fn read_project_name(&self, root: &Path) -> Result<String, AdapterError> {
        self.load(root)?
            .name()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::ManifestParseError("No package.name found".to_string()))
    }

    fn read_registry_urls(&self, root: &Path) -> Result<Vec<RegistryUrl>, AdapterError> {
        let manifest = self.load(root)?;
        if !manifest.has_package() || manifest.publish_disabled() {
            return Ok(Vec::new());
        }
        Ok(vec![(
            REGISTRY.to_string(),
            manifest.repository().map(str::to_string),
        )])
    }
}

/// Publishes a crate with `cargo package` then `cargo publish`
#[derive(Debug, Clone)]
pub struct CargoPublisher {
    cargo: String,
}

impl Default for CargoPublisher {
    fn default() -> Self {
        Self {
            cargo: "cargo".to_string(),
        }
    }
}

impl CargoPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another `cargo` executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            cargo: program.into(),
        }
    }
}

#[async_trait]
impl Publisher for CargoPublisher {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    fn registry(&self) -> &'static str {
        REGISTRY
    }

    #[instrument(skip_all, fields(root = %root.display()))]
    async fn publish(&self, root: &Path, _config: &ProjectConfig) -> PublishOutcome {
        let registry = REGISTRY.to_string();
        match CargoToml::load(&root.join("Cargo.toml")) {
            Ok(manifest) if !manifest.has_package() => {
                return PublishOutcome::Skipped {
                    registry,
                    reason: "virtual workspace manifest".to_string(),
                }
            }
            Ok(manifest) if manifest.publish_disabled() => {
                return PublishOutcome::Skipped {
                    registry,
                    reason: "publish = false".to_string(),
                }
            }
            Ok(_) => {}
            Err(e) => {
                return PublishOutcome::Failed {
                    registry,
                    stage: PublishFailure::Build,
                    reason: e.to_string(),
                }
            }
        }

        let mut envs = Vec::new();
        match CredentialProvider::new().get(REGISTRY) {
            Ok(Some(credential)) => {
                if let Some(token) = credential.as_token() {
                    envs.push(("CARGO_REGISTRY_TOKEN", token.to_string()));
                }
            }
            Ok(None) => debug!("no crates.io token found, relying on cargo login"),
            Err(e) => warn!(error = %e, "unable to read crates.io credentials"),
        }

        if let Err(reason) = run_tool(&self.cargo, ["package", "--allow-dirty"], root, &envs).await {
            return PublishOutcome::Failed {
                registry,
                stage: PublishFailure::Build,
                reason,
            };
        }
        if let Err(reason) = run_tool(&self.cargo, ["publish", "--no-verify"], root, &envs).await {
            return PublishOutcome::Failed {
                registry,
                stage: PublishFailure::Upload,
                reason,
            };
        }
        PublishOutcome::Succeeded { registry }
    }

    /// Crate archives written by `cargo package`
    fn artifacts(&self, root: &Path) -> Vec<PathBuf> {
        let pattern = root.join("target").join("package").join("*.crate");
        let mut found: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
            Err(e) => {
                warn!(error = %e, "invalid package pattern");
                Vec::new()
            }
        };
        found.sort();
        found
    }
}

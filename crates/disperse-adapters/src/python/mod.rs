//! Python projects: pyproject.toml and PyPI uploads

mod pyproject;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use disperse_core::config::ProjectConfig;
use disperse_core::error::{AdapterError, VersionError};
use disperse_core::traits::{ManifestAdapter, Publisher, RegistryUrl};
use disperse_core::types::{Ecosystem, PublishFailure, PublishOutcome};
use disperse_core::version::Version;

use crate::credentials::CredentialProvider;
use crate::publish::run_tool;
pub use pyproject::{PyProject, VersionTable};

const REGISTRY: &str = "pypi";

/// Python package adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonAdapter;

impl PythonAdapter {
    pub fn new() -> Self {
        Self
    }

    fn manifest_path(&self, root: &Path) -> PathBuf {
        root.join("pyproject.toml")
    }

    fn load(&self, root: &Path) -> Result<PyProject, AdapterError> {
        let path = self.manifest_path(root);
        if !path.exists() && root.join("setup.py").exists() {
            return Err(AdapterError::VersionNotLocated {
                path: root.join("setup.py"),
                reason: "version is computed by setup.py".to_string(),
            });
        }
        PyProject::load(&path)
    }
}

impl ManifestAdapter for PythonAdapter {
    fn name(&self) -> &'static str {
        "python"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn detect(&self, root: &Path) -> bool {
        let found = self.manifest_path(root).exists() || root.join("setup.py").exists();
        debug!(adapter = "python", path = %root.display(), found, "detecting manifest");
        found
    }

    fn manifest_files(&self, root: &Path) -> Vec<PathBuf> {
        vec![self.manifest_path(root)]
    }

    fn read_version(&self, root: &Path) -> Result<Version, AdapterError> {
        let manifest = self.load(root)?;
        let (_, raw) = manifest.locate_version()?;
        raw.parse()
            .map_err(|e: VersionError| AdapterError::ManifestParseError(e.to_string()))
    }

    #[instrument(skip_all, fields(root = %root.display(), version = %version))]
    fn write_version(&self, root: &Path, version: &Version) -> Result<(), AdapterError> {
        let mut manifest = self.load(root)?;
        let (table, _) = manifest.locate_version()?;
        manifest.set_version(table, &version.to_string())?;
        manifest.save()?;
        info!(adapter = "python", ?table, "updated pyproject.toml");
        Ok(())
    }

    fn read_project_name(&self, root: &Path) -> Result<String, AdapterError> {
        self.load(root)?
            .name()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::ManifestParseError("No project.name found".to_string()))
    }

    fn read_registry_urls(&self, root: &Path) -> Result<Vec<RegistryUrl>, AdapterError> {
        let manifest = match self.load(root) {
            Ok(manifest) => manifest,
            Err(AdapterError::VersionNotLocated { .. }) => {
                return Ok(vec![(REGISTRY.to_string(), None)])
            }
            Err(e) => return Err(e),
        };
        Ok(vec![(
            REGISTRY.to_string(),
            manifest.repository().map(str::to_string),
        )])
    }
}

/// Builds an sdist and wheel and uploads them with twine
#[derive(Debug, Clone)]
pub struct PythonPublisher {
    python: String,
    twine: String,
}

impl Default for PythonPublisher {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            twine: "twine".to_string(),
        }
    }
}

impl PythonPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_programs(python: impl Into<String>, twine: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            twine: twine.into(),
        }
    }
}

/// Built distributions waiting in `dist/`
fn distributions(root: &Path) -> Vec<PathBuf> {
    let pattern = root.join("dist").join("*");
    match glob::glob(&pattern.to_string_lossy()) {
        Ok(paths) => {
            let mut found: Vec<PathBuf> = paths
                .filter_map(|p| p.ok())
                .filter(|p| {
                    p.extension()
                        .is_some_and(|e| e == "whl" || e == "gz" || e == "zip")
                })
                .collect();
            found.sort();
            found
        }
        Err(e) => {
            warn!(error = %e, "invalid dist pattern");
            Vec::new()
        }
    }
}

#[async_trait]
impl Publisher for PythonPublisher {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn registry(&self) -> &'static str {
        REGISTRY
    }

    #[instrument(skip_all, fields(root = %root.display()))]
    async fn publish(&self, root: &Path, _config: &ProjectConfig) -> PublishOutcome {
        let registry = REGISTRY.to_string();
        let failed = |stage, reason| PublishOutcome::Failed {
            registry: REGISTRY.to_string(),
            stage,
            reason,
        };

        let stale = root.join("dist");
        if stale.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&stale) {
                return failed(PublishFailure::Build, format!("unable to clear dist/: {e}"));
            }
        }
        if let Err(reason) = run_tool(&self.python, ["-m", "build"], root, &[]).await {
            return failed(PublishFailure::Build, reason);
        }
        let dists = distributions(root);
        if dists.is_empty() {
            return failed(PublishFailure::Build, "no distributions in dist/".to_string());
        }
        info!(count = dists.len(), "built distributions");

        let envs = match CredentialProvider::new().get(REGISTRY) {
            Ok(Some(credential)) => credential.twine_env(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "unable to read PyPI credentials");
                Vec::new()
            }
        };
        let mut args = vec![PathBuf::from("upload"), PathBuf::from("--non-interactive")];
        args.extend(dists);
        if let Err(reason) = run_tool(&self.twine, &args, root, &envs).await {
            return failed(PublishFailure::Upload, reason);
        }
        PublishOutcome::Succeeded { registry }
    }

    fn artifacts(&self, root: &Path) -> Vec<PathBuf> {
        distributions(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(pyproject: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("pyproject.toml"), pyproject).unwrap();
        temp
    }

    #[test]
    fn test_read_and_write_version() {
        let adapter = PythonAdapter::new();
        let temp = project("[project]\nname = \"example\"\nversion = \"0.4.1\"\n");
        assert!(adapter.detect(temp.path()));
        assert_eq!(adapter.read_version(temp.path()).unwrap().to_string(), "0.4.1");
        assert_eq!(adapter.read_project_name(temp.path()).unwrap(), "example");

        adapter
            .write_version(temp.path(), &"0.4.2".parse().unwrap())
            .unwrap();
        assert_eq!(
            adapter.read_version(temp.path()).unwrap().to_string(),
            "0.4.2"
        );
    }

    #[test]
    fn test_setup_py_only_is_not_located() {
        let adapter = PythonAdapter::new();
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("setup.py"), "from setuptools import setup\nsetup()\n")
            .unwrap();
        assert!(adapter.detect(temp.path()));
        assert!(matches!(
            adapter.read_version(temp.path()),
            Err(AdapterError::VersionNotLocated { .. })
        ));
        assert_eq!(
            adapter.read_registry_urls(temp.path()).unwrap(),
            vec![("pypi".to_string(), None)]
        );
    }

    #[test]
    fn test_dynamic_version_write_is_refused() {
        let adapter = PythonAdapter::new();
        let temp = project("[project]\nname = \"x\"\ndynamic = [\"version\"]\n");
        assert!(adapter
            .write_version(temp.path(), &"1.0.0".parse().unwrap())
            .is_err());
        assert!(!std::fs::read_to_string(temp.path().join("pyproject.toml"))
            .unwrap()
            .contains("1.0.0"));
    }

    #[tokio::test]
    async fn test_build_failure() {
        let temp = project("[project]\nname = \"x\"\nversion = \"1.0.0\"\n");
        let outcome = PythonPublisher::with_programs("false", "true")
            .publish(temp.path(), &ProjectConfig::default())
            .await;
        assert!(matches!(
            outcome,
            PublishOutcome::Failed {
                stage: PublishFailure::Build,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_upload_failure() {
        let temp = project("[project]\nname = \"x\"\nversion = \"1.0.0\"\n");
        let script = temp.path().join("fake-python");
        std::fs::write(
            &script,
            "#!/bin/sh\nmkdir -p dist && touch dist/x-1.0.0.tar.gz dist/x-1.0.0-py3-none-any.whl\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let python = script.to_string_lossy().into_owned();

        let outcome = PythonPublisher::with_programs(python.clone(), "false")
            .publish(temp.path(), &ProjectConfig::default())
            .await;
        assert!(matches!(
            outcome,
            PublishOutcome::Failed {
                stage: PublishFailure::Upload,
                ..
            }
        ));

        let publisher = PythonPublisher::with_programs(python, "true");
        let outcome = publisher
            .publish(temp.path(), &ProjectConfig::default())
            .await;
        assert!(!outcome.is_failure());
        let names: Vec<_> = publisher
            .artifacts(temp.path())
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["x-1.0.0-py3-none-any.whl", "x-1.0.0.tar.gz"]);
    }
}

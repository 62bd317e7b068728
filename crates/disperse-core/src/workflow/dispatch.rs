//! Publisher dispatch: pick the upload procedure for an ecosystem

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ProjectConfig;
use crate::traits::Publisher;
use crate::types::{Ecosystem, PublishFailure, PublishOutcome};

/// Registry of publishers, one per ecosystem
#[derive(Clone)]
pub struct PublisherDispatch {
    publishers: Vec<Arc<dyn Publisher>>,
    /// Copies artifacts to a `tarball-location`, invoked as `program ARTIFACT... LOCATION`
    tarball_program: String,
}

impl Default for PublisherDispatch {
    fn default() -> Self {
        Self {
            publishers: Vec::new(),
            tarball_program: "scp".to_string(),
        }
    }
}

impl PublisherDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tarball_program(mut self, program: impl Into<String>) -> Self {
        self.tarball_program = program.into();
        self
    }

    pub fn with(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn get(&self, ecosystem: Ecosystem) -> Option<&Arc<dyn Publisher>> {
        self.publishers.iter().find(|p| p.ecosystem() == ecosystem)
    }

    /// Build and upload `root` for `ecosystem`.
    ///
    /// Projects without a known ecosystem or publisher, and registries
    /// disabled in configuration, are skipped rather than failed.
    pub async fn publish(
        &self,
        ecosystem: Option<Ecosystem>,
        root: &Path,
        config: &ProjectConfig,
    ) -> PublishOutcome {
        let Some(ecosystem) = ecosystem else {
            return PublishOutcome::Skipped {
                registry: "none".to_string(),
                reason: "no supported manifest".to_string(),
            };
        };
        let Some(publisher) = self.get(ecosystem) else {
            return PublishOutcome::Skipped {
                registry: ecosystem.registry().to_string(),
                reason: format!("no publisher for {ecosystem}"),
            };
        };
        let registry = publisher.registry();
        if config.skips_registry(registry) {
            return PublishOutcome::Skipped {
                registry: registry.to_string(),
                reason: "disabled in configuration".to_string(),
            };
        }
        let outcome = publisher.publish(root, config).await;
        match &outcome {
            PublishOutcome::Failed { .. } => warn!(registry, %outcome, "publish failed"),
            _ => info!(registry, %outcome, "publish finished"),
        }
        outcome
    }

    /// Copy the artifacts of the last publish to every `tarball-location`.
    ///
    /// One outcome per location, named after it.
    pub async fn upload_tarballs(
        &self,
        ecosystem: Option<Ecosystem>,
        root: &Path,
        config: &ProjectConfig,
    ) -> Vec<PublishOutcome> {
        if config.tarball_location.is_empty() {
            return Vec::new();
        }
        let artifacts = ecosystem
            .and_then(|e| self.get(e))
            .map(|p| p.artifacts(root))
            .unwrap_or_default();
        let mut outcomes = Vec::with_capacity(config.tarball_location.len());
        for location in &config.tarball_location {
            let registry = location.clone();
            let outcome = if artifacts.is_empty() {
                PublishOutcome::Skipped {
                    registry,
                    reason: "no artifacts to copy".to_string(),
                }
            } else {
                match self.copy_artifacts(&artifacts, location, root).await {
                    Ok(()) => PublishOutcome::Succeeded { registry },
                    Err(reason) => PublishOutcome::Failed {
                        registry,
                        stage: PublishFailure::Upload,
                        reason,
                    },
                }
            };
            match &outcome {
                PublishOutcome::Failed { .. } => {
                    warn!(location = %location, %outcome, "tarball upload failed")
                }
                _ => info!(
                    location = %location,
                    %outcome,
                    artifacts = artifacts.len(),
                    "tarball upload finished"
                ),
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn copy_artifacts(
        &self,
        artifacts: &[PathBuf],
        location: &str,
        root: &Path,
    ) -> Result<(), String> {
        let program = &self.tarball_program;
        let status = Command::new(program)
            .args(artifacts)
            .arg(location)
            .current_dir(root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| format!("unable to run {program}: {e}"))?;
        if !status.success() {
            return Err(format!("{program} to {location} exited with {status}"));
        }
        Ok(())
    }
}

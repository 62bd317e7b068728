//! Discovery scanner: enumerate owned projects and release each one
//!
//! Enumeration is a lazy stream over the configured sources; a source that
//! fails to list shows up as one error item and the next source is asked.
//! Each project is released independently, so one broken project never
//! stops the rest of the fleet.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ConfigError, DisperseError, RemoteError, Result};
use crate::traits::{ProjectRef, ProjectSource};
use crate::types::ReleaseReport;

/// Projects listed explicitly in the operator configuration
pub struct StaticSource {
    name: String,
    projects: Vec<ProjectRef>,
}

impl StaticSource {
    /// Source over repository URLs or local paths
    pub fn from_locations(name: impl Into<String>, locations: &[String]) -> Self {
        let name = name.into();
        let projects = locations
            .iter()
            .map(|location| ProjectRef {
                name: project_name_from_location(location),
                source: name.clone(),
                location: Some(location.clone()),
            })
            .collect();
        Self { name, projects }
    }
}

#[async_trait]
impl ProjectSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_projects(&self) -> std::result::Result<Vec<ProjectRef>, RemoteError> {
        Ok(self.projects.clone())
    }
}

/// Last path segment of a URL or path, without a `.git` suffix
pub fn project_name_from_location(location: &str) -> String {
    let trimmed = location.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// A source that could not be enumerated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// Lazily list projects from every source, in order.
///
/// Calling this again starts a fresh enumeration. Projects reported by more
/// than one source are yielded once.
pub fn list_owned_projects(
    sources: &[Arc<dyn ProjectSource>],
) -> impl Stream<Item = std::result::Result<ProjectRef, SourceFailure>> + '_ {
    let mut seen = HashSet::new();
    stream::iter(sources)
        .then(|source| async move {
            match source.list_projects().await {
                Ok(projects) => {
                    info!(source = source.name(), count = projects.len(), "listed projects");
                    projects.into_iter().map(Ok).collect::<Vec<_>>()
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "unable to list projects");
                    vec![Err(SourceFailure {
                        source: source.name().to_string(),
                        reason: e.to_string(),
                    })]
                }
            }
        })
        .flat_map(stream::iter)
        .filter(move |item| {
            let keep = match item {
                Ok(project) => seen.insert(
                    project
                        .location
                        .clone()
                        .unwrap_or_else(|| project.name.clone()),
                ),
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
}

/// Resolves a checkout for a project and releases it
#[async_trait(?Send)]
pub trait ProjectRunner {
    async fn release(&self, project: &ProjectRef) -> Result<ReleaseReport>;
}

/// What happened to one project in a fleet run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum FleetOutcome {
    /// The orchestrator ran; the report holds its terminal state
    Released { report: ReleaseReport },
    /// The project is not set up for releasing
    Skipped { reason: String },
    /// The project could not even be attempted
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetEntry {
    pub project: ProjectRef,
    #[serde(flatten)]
    pub outcome: FleetOutcome,
}

impl FleetEntry {
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            FleetOutcome::Released { report } => report.state.is_failure(),
            FleetOutcome::Skipped { .. } => false,
            FleetOutcome::Failed { .. } => true,
        }
    }
}

/// Per-project results of a discover run
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetReport {
    pub entries: Vec<FleetEntry>,
    pub source_failures: Vec<SourceFailure>,
}

impl FleetReport {
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, FleetOutcome::Skipped { .. }))
            .count()
    }
}

fn classify(result: Result<ReleaseReport>) -> FleetOutcome {
    match result {
        Ok(report) => FleetOutcome::Released { report },
        Err(DisperseError::Config(ConfigError::NotFound(path))) => FleetOutcome::Skipped {
            reason: format!("no release configuration in {}", path.display()),
        },
        Err(e) => FleetOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

/// Release every project yielded by `projects`, at most `jobs` at a time.
pub async fn run_fleet<S>(projects: S, runner: &dyn ProjectRunner, jobs: usize) -> FleetReport
where
    S: Stream<Item = std::result::Result<ProjectRef, SourceFailure>>,
{
    let mut report = FleetReport::default();
    let mut attempts = std::pin::pin!(projects
        .map(|item| async move {
            match item {
                Ok(project) => {
                    info!(project = %project.name, source = %project.source, "processing project");
                    let outcome = classify(runner.release(&project).await);
                    Ok(FleetEntry { project, outcome })
                }
                Err(failure) => Err(failure),
            }
        })
        .buffer_unordered(jobs.max(1)));

    while let Some(result) = attempts.next().await {
        match result {
            Ok(entry) => {
                if entry.is_failure() {
                    warn!(project = %entry.project.name, "project failed");
                }
                report.entries.push(entry);
            }
            Err(failure) => report.source_failures.push(failure),
        }
    }
    info!(
        projects = report.entries.len(),
        failures = report.failures(),
        skipped = report.skipped(),
        source_failures = report.source_failures.len(),
        "discover finished"
    );
    report
}

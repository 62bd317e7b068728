//! Core types for disperse

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Project ecosystem, identified by its manifest convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// `pyproject.toml` projects published to PyPI
    Python,
    /// `Cargo.toml` projects published to crates.io
    Rust,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
        }
    }

    /// Name of the registry this ecosystem publishes to
    pub fn registry(&self) -> &'static str {
        match self {
            Self::Python => "pypi",
            Self::Rust => "crates.io",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the engine decided to do for one release attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub project: String,
    pub ecosystem: Option<Ecosystem>,
    /// Version currently released
    pub current: Version,
    /// Tag the current version came from, if any
    pub current_tag: Option<String>,
    pub next: Version,
    pub tag: String,
    pub files_to_mutate: Vec<PathBuf>,
    pub dry_run: bool,
}

/// The pre-flight checks, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateCheck {
    Ci,
    Staleness,
    UnreleasedChanges,
    CleanTree,
}

impl GateCheck {
    pub const ALL: [GateCheck; 4] = [
        GateCheck::Ci,
        GateCheck::Staleness,
        GateCheck::UnreleasedChanges,
        GateCheck::CleanTree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ci => "ci",
            Self::Staleness => "staleness",
            Self::UnreleasedChanges => "unreleased-changes",
            Self::CleanTree => "clean-tree",
        }
    }
}

impl fmt::Display for GateCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pass,
    Fail,
    Skip,
}

/// Outcome of a single gate check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub check: GateCheck,
    pub status: GateStatus,
    pub reason: String,
}

impl GateResult {
    pub fn pass(check: GateCheck, reason: impl Into<String>) -> Self {
        Self {
            check,
            status: GateStatus::Pass,
            reason: reason.into(),
        }
    }

    pub fn fail(check: GateCheck, reason: impl Into<String>) -> Self {
        Self {
            check,
            status: GateStatus::Fail,
            reason: reason.into(),
        }
    }

    pub fn skip(check: GateCheck, reason: impl Into<String>) -> Self {
        Self {
            check,
            status: GateStatus::Skip,
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == GateStatus::Fail
    }
}

/// Which half of a publish procedure failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishFailure {
    Build,
    Upload,
}

/// Per-registry publish result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PublishOutcome {
    Succeeded {
        registry: String,
    },
    Failed {
        registry: String,
        stage: PublishFailure,
        reason: String,
    },
    Skipped {
        registry: String,
        reason: String,
    },
}

impl PublishOutcome {
    pub fn registry(&self) -> &str {
        match self {
            Self::Succeeded { registry }
            | Self::Failed { registry, .. }
            | Self::Skipped { registry, .. } => registry,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { registry } => write!(f, "{registry}: published"),
            Self::Failed {
                registry,
                stage,
                reason,
            } => {
                let what = match stage {
                    PublishFailure::Build => "build failed",
                    PublishFailure::Upload => "upload failed",
                };
                write!(f, "{registry}: {what}: {reason}")
            }
            Self::Skipped { registry, reason } => write!(f, "{registry}: skipped ({reason})"),
        }
    }
}

/// Release state machine stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discovering,
    Planning,
    Gating,
    Mutating,
    Verifying,
    Publishing,
    Tagging,
    Announcing,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Planning => "planning",
            Self::Gating => "gating",
            Self::Mutating => "mutating",
            Self::Verifying => "verifying",
            Self::Publishing => "publishing",
            Self::Tagging => "tagging",
            Self::Announcing => "announcing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a release attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum TerminalState {
    Done,
    /// Only the unreleased-changes check blocked the release
    NothingToRelease,
    Failed {
        stage: Stage,
        reason: String,
    },
    /// Dry run finished after planning and gating
    Aborted,
}

impl TerminalState {
    pub fn failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::NothingToRelease => write!(f, "nothing to release"),
            Self::Failed { stage, reason } => write!(f, "failed while {stage}: {reason}"),
            Self::Aborted => write!(f, "aborted (dry run)"),
        }
    }
}

/// Final per-project report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub project: String,
    pub state: TerminalState,
    pub plan: Option<ReleasePlan>,
    pub gate: Vec<GateResult>,
    pub publish: Vec<PublishOutcome>,
    pub stages: Vec<Stage>,
    pub warnings: Vec<String>,
}

impl ReleaseReport {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            state: TerminalState::Done,
            plan: None,
            gate: Vec::new(),
            publish: Vec::new(),
            stages: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Next version, if planning got that far
    pub fn version(&self) -> Option<&Version> {
        self.plan.as_ref().map(|p| &p.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_outcome_display() {
        let failed = PublishOutcome::Failed {
            registry: "pypi".into(),
            stage: PublishFailure::Build,
            reason: "exit 1".into(),
        };
        assert_eq!(failed.to_string(), "pypi: build failed: exit 1");
        assert!(failed.is_failure());
    }

    #[test]
    fn test_terminal_state_serializes_tagged() {
        let state = TerminalState::failed(Stage::Verifying, "exit status 1");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["stage"], "verifying");
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Planning < Stage::Gating);
        assert!(Stage::Tagging < Stage::Announcing);
    }
}

//! Disperse Core - release engine
//!
//! This crate holds the version model, tag templates, configuration,
//! pre-flight gate and the release state machine. Version control,
//! registries and hosting platforms are reached through the traits in
//! [`traits`] and implemented in sibling crates.

pub mod config;
pub mod discovery;
pub mod error;
pub mod manpage;
pub mod news_file;
pub mod project;
pub mod retry;
pub mod tag;
pub mod traits;
pub mod types;
pub mod update_version;
pub mod version;
pub mod workflow;

pub use discovery::{list_owned_projects, run_fleet, FleetReport, ProjectRunner, StaticSource};
pub use error::{DisperseError, Result};
pub use project::Project;
pub use tag::TagTemplate;
pub use types::{Ecosystem, ReleasePlan, ReleaseReport, Stage, TerminalState};
pub use version::{BumpLevel, Version};
pub use workflow::{Collaborators, Orchestrator, PublisherDispatch, ReleaseOptions};

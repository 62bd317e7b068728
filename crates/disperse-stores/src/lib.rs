//! Remote services a release talks to
//!
//! - **GitHub**: CI check-runs and release entries
//! - **Launchpad**: milestones and product releases
//! - **PyPI** and **crates.io**: projects owned by a user, for discovery
//!
//! Every client converts its [`StoreError`] into a classified
//! [`RemoteError`](disperse_core::error::RemoteError) at the trait boundary,
//! so the engine's retry policy can tell transient failures from permanent
//! ones.

pub mod error;
pub mod github;
mod http;
pub mod launchpad;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use error::StoreError;
pub use github::GitHubClient;
pub use launchpad::{LaunchpadClient, LaunchpadCredentials};
pub use sources::{CratesIoSource, PypiSource};

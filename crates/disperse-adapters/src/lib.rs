//! Disperse Adapters - Cargo and Python manifests and publishers

pub mod cargo;
pub mod credentials;
mod publish;
pub mod python;
pub mod registry;

pub use cargo::{CargoAdapter, CargoPublisher};
pub use credentials::{Credential, CredentialProvider};
pub use python::{PythonAdapter, PythonPublisher};
pub use registry::{default_publishers, AdapterRegistry};

//! Built-in adapters and publishers

use std::path::Path;
use std::sync::Arc;

use disperse_core::traits::ManifestAdapter;
use disperse_core::workflow::PublisherDispatch;

use crate::cargo::{CargoAdapter, CargoPublisher};
use crate::python::{PythonAdapter, PythonPublisher};

/// Manifest adapters in detection priority order
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn ManifestAdapter>>,
}

impl AdapterRegistry {
    /// Registry with every built-in adapter; Cargo wins over Python
    pub fn new() -> Self {
        Self {
            adapters: vec![Arc::new(CargoAdapter::new()), Arc::new(PythonAdapter::new())],
        }
    }

    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn register<A: ManifestAdapter + 'static>(&mut self, adapter: A) {
        self.adapters.push(Arc::new(adapter));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ManifestAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// First adapter whose marker file exists under `root`
    pub fn detect(&self, root: &Path) -> Option<Arc<dyn ManifestAdapter>> {
        self.adapters.iter().find(|a| a.detect(root)).cloned()
    }

    pub fn all(&self) -> &[Arc<dyn ManifestAdapter>] {
        &self.adapters
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatch table with the crates.io and PyPI publishers
pub fn default_publishers() -> PublisherDispatch {
    PublisherDispatch::new()
        .with(Arc::new(CargoPublisher::new()))
        .with(Arc::new(PythonPublisher::new()))
}

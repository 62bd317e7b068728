//! Registries as sources of owned projects

mod crates_io;
mod pypi;

pub use crates_io::CratesIoSource;
pub use pypi::PypiSource;

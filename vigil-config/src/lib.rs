//! Configuration loading and on-disk path resolution for the Vigil daemon.

mod loader;
mod models;
mod paths;

pub use loader::{ConfigLoadError, ConfigLoader};
pub use models::{Config, IngestConfig, ServerConfig};
pub use paths::Paths;

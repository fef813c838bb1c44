//! Export settings: an optional YAML file plus the validated [`ExportOptions`].

mod file;
mod options;

pub use file::{AccessConfig, ConfigFile, RetryConfig, StorageConfig};
pub use options::{DEFAULT_CONCURRENCY, DEFAULT_GRID_CALLBACK, ExportOptions, ExportOptionsBuilder};

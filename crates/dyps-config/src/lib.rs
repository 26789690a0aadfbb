//! Configuration for dyps resolution runs
//!
//! This crate handles parsing and validation of dyps.toml files and layers
//! them with the global configuration, environment variables and explicit
//! overrides into the settings a resolution run reads.

pub mod merge;
pub mod settings;
pub mod toml;

// Re-export main types
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource, CONFIG_FILE_NAME};
pub use settings::{DypsSettings, FetchSettings, ResolverSettings, RetrySettings, VersionPreference};
pub use toml::{DypsToml, FetchSection, ResolverSection, RetrySection};

use dyps_core::error::DypsError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, DypsError>;

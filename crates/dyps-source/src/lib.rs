//! Repository sources for dyps
//!
//! This crate defines the collaborator interfaces the resolver consumes
//! (manifest lookup and version listing) and ships composable implementations:
//! an in-memory source, a retry/timeout wrapper, and an exact-version memo.

pub mod api;
pub mod cache;
pub mod memory;
pub mod retry;

// Re-export main types
pub use api::{ManifestSource, RepositorySource, VersionSource};
pub use cache::{CacheStats, MemoizedSource};
pub use memory::InMemorySource;
pub use retry::RetryingSource;

use dyps_core::error::DypsError;

/// Result type for repository source operations
pub type SourceResult<T> = Result<T, DypsError>;

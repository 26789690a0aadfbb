//! # dyps-core
//!
//! Core types and utilities shared across all dyps crates.
//!
//! This crate provides:
//! - `RepositoryId`, `Version` and `VersionId` identifiers
//! - `VersionConstraint`, the sum type every resolver phase intersects
//! - `DependencyDeclaration`, one entry of a repository manifest
//! - `DypsError` enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (versions, constraints, declarations)
//! - `error`: Error types and result aliases
//! - `utils`: Source URL normalization and hashing helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{DypsError, DypsResult};
pub use types::{
    Bound, DependencyDeclaration, RepositoryId, Version, VersionConstraint, VersionError,
    VersionId, VersionRange,
};

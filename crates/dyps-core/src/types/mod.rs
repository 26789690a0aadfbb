//! Core data types for dyps.
//!
//! This module provides the fundamental types every resolver phase shares:
//! - Repository identifiers
//! - Release versions and concrete version identifiers
//! - Version constraints and their intersection
//! - Manifest dependency declarations

pub mod constraint;
pub mod dependency;
pub mod repository;
pub mod version;

// Re-export all public types
pub use constraint::{Bound, VersionConstraint, VersionRange};
pub use dependency::DependencyDeclaration;
pub use repository::RepositoryId;
pub use version::{Version, VersionError, VersionId};

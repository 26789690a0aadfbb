//! Dependency declarations read from repository manifests.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{RepositoryId, VersionConstraint};

/// One entry of a manifest: `from` depends on `to` under `constraint`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub from: RepositoryId,
    pub to: RepositoryId,
    #[serde(default)]
    pub constraint: VersionConstraint,
    /// Where the dependency's sources are fetched from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<String>,
}

impl DependencyDeclaration {
    /// Create a declaration without an explicit source location
    pub fn new(from: RepositoryId, to: RepositoryId, constraint: VersionConstraint) -> Self {
        Self {
            from,
            to,
            constraint,
            source_location: None,
        }
    }

    /// Set the source location
    pub fn with_source(mut self, location: impl Into<String>) -> Self {
        self.source_location = Some(location.into());
        self
    }

    /// Check if a repository declares a dependency on itself
    pub fn is_self_dependency(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for DependencyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.constraint)
    }
}

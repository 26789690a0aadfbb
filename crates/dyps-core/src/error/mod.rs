//! Error types and result aliases for dyps operations.
//!
//! Provides a unified error type that covers every failure a resolution run can
//! report, with the offending repositories attached and actionable hints.

use thiserror::Error;

use crate::types::{RepositoryId, VersionConstraint, VersionError, VersionId};

/// Unified error type for all dyps operations
#[derive(Error, Debug)]
pub enum DypsError {
    // Collaborator errors
    #[error("Failed to fetch manifest of {repo}: {message}")]
    ManifestFetch {
        repo: RepositoryId,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Resolution errors
    #[error("Version conflict for {repo}: {}", format_requirements(.constraints))]
    Conflict {
        repo: RepositoryId,
        /// Every constraint implicated, keyed by the repository that declared it
        constraints: Vec<(RepositoryId, VersionConstraint)>,
    },

    #[error(
        "No version of {repo} satisfies {constraint} (available: {})",
        format_versions(.available)
    )]
    Unresolvable {
        repo: RepositoryId,
        constraint: VersionConstraint,
        available: Vec<VersionId>,
    },

    #[error("Circular dependency detected: {}", format_cycle(.path))]
    Cycle { path: Vec<RepositoryId> },

    #[error("Resolution did not converge: manifest of {repo} changed after {fetches} fetches")]
    DidNotConverge { repo: RepositoryId, fetches: u32 },

    #[error("Internal resolver error: {message}")]
    Assertion { message: String },

    #[error("Resolution was cancelled")]
    Cancelled,

    // Input errors
    #[error("Invalid version '{input}': {source}")]
    InvalidVersion {
        input: String,
        #[source]
        source: VersionError,
    },

    #[error("Invalid version constraint '{input}': {reason}")]
    InvalidConstraint { input: String, reason: String },

    #[error("Invalid repository identifier '{input}': {reason}")]
    InvalidRepository { input: String, reason: String },

    // Config errors
    #[error("Failed to parse dyps.toml: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for dyps operations
pub type DypsResult<T> = Result<T, DypsError>;

impl DypsError {
    /// Create a manifest fetch error from any error type
    pub fn fetch<E>(repo: RepositoryId, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ManifestFetch {
            repo,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a manifest fetch error without an underlying cause
    pub fn fetch_message(repo: RepositoryId, message: impl Into<String>) -> Self {
        Self::ManifestFetch {
            repo,
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal invariant violation
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Check if this error is recoverable by retrying the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DypsError::ManifestFetch { .. } | DypsError::Io { .. })
    }

    /// Check if this error indicates a bug in the resolver itself
    pub fn is_internal(&self) -> bool {
        matches!(self, DypsError::Assertion { .. })
    }

    /// Repository the error is about, when there is exactly one
    pub fn repository(&self) -> Option<&RepositoryId> {
        match self {
            DypsError::ManifestFetch { repo, .. }
            | DypsError::Conflict { repo, .. }
            | DypsError::Unresolvable { repo, .. }
            | DypsError::DidNotConverge { repo, .. } => Some(repo),
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DypsError::ManifestFetch { .. } => {
                Some("Check that the repository location is reachable and try again")
            },
            DypsError::Conflict { .. } => {
                Some("Edit the listed manifests so their constraints on this repository overlap")
            },
            DypsError::Unresolvable { .. } => {
                Some("Publish a matching tag or relax the version constraint")
            },
            DypsError::Cycle { .. } => {
                Some("Remove one dependency declaration on the reported path to break the cycle")
            },
            DypsError::DidNotConverge { .. } => {
                Some("Manifests declare different dependencies per version; pin the repository to an exact version")
            },
            DypsError::Assertion { .. } => {
                Some("This is a bug in dyps, please report it together with the manifests involved")
            },
            DypsError::TomlParse { .. } | DypsError::ConfigValidation { .. } => {
                Some("Fix the reported field in dyps.toml or the matching DYPS_* environment variable")
            },
            _ => None,
        }
    }
}

impl From<VersionError> for DypsError {
    fn from(source: VersionError) -> Self {
        DypsError::InvalidVersion {
            input: source.input().to_string(),
            source,
        }
    }
}

/// Format a requirement list as "a requires =1.0, b requires >=2"
fn format_requirements(constraints: &[(RepositoryId, VersionConstraint)]) -> String {
    constraints
        .iter()
        .map(|(requester, constraint)| format!("{} requires {}", requester, constraint))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_versions(versions: &[VersionId]) -> String {
    if versions.is_empty() {
        return "none".to_string();
    }
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format cycle as "a -> b -> c -> a"
pub fn format_cycle(path: &[RepositoryId]) -> String {
    if path.is_empty() {
        return "No cycle".to_string();
    }

    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

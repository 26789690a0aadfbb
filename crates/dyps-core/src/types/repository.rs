//! Repository identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DypsError, DypsResult};
use crate::utils::url::{normalize_source_url, short_name};

/// Unique identifier of a repository: a canonical source URL or a plain name
///
/// Identifiers are normalized on construction, so equal locations compare equal
/// however they were spelled in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Create an identifier from a name or source URL
    pub fn new(input: &str) -> DypsResult<Self> {
        let normalized = normalize_source_url(input);

        if normalized.is_empty() {
            return Err(DypsError::InvalidRepository {
                input: input.to_string(),
                reason: "repository identifier is empty".to_string(),
            });
        }

        if normalized.chars().any(char::is_whitespace) {
            return Err(DypsError::InvalidRepository {
                input: input.to_string(),
                reason: "repository identifier contains whitespace".to_string(),
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short name for logs: the last path segment of the location
    pub fn name(&self) -> &str {
        short_name(&self.0)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepositoryId {
    type Err = DypsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepositoryId::new(s)
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = DypsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RepositoryId::new(&value)
    }
}

impl From<RepositoryId> for String {
    fn from(id: RepositoryId) -> Self {
        id.0
    }
}

impl AsRef<str> for RepositoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

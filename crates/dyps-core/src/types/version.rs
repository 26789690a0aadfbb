//! Release versions and version identifiers.
//!
//! Repository tags rarely follow strict semver: `1.5`, `v2`, `1.2.3.4` all show
//! up in the wild. `Version` accepts any number of numeric components and
//! compares them with missing trailing components treated as zero.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Release version (1, 1.5, 1.2.3-rc.1+build)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub release: Vec<u64>,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

/// A concrete revision a repository can be checked out at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionId {
    /// A tag that parses as a release version
    Release(Version),
    /// A branch or any other named reference
    Ref(String),
}

/// Version parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {input}")]
    InvalidFormat { input: String },

    #[error("Invalid number in version {input}: {component}")]
    InvalidNumber { input: String, component: String },

    #[error("Invalid prerelease identifier in {input}: {prerelease}")]
    InvalidPrerelease { input: String, prerelease: String },

    #[error("Invalid build metadata in {input}: {build}")]
    InvalidBuild { input: String, build: String },
}

impl VersionError {
    /// The text that failed to parse
    pub fn input(&self) -> &str {
        match self {
            VersionError::InvalidFormat { input }
            | VersionError::InvalidNumber { input, .. }
            | VersionError::InvalidPrerelease { input, .. }
            | VersionError::InvalidBuild { input, .. } => input,
        }
    }
}

impl Version {
    /// Create a new three-component version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self::from_release(vec![major, minor, patch])
    }

    /// Create a version from its numeric components
    pub fn from_release(release: Vec<u64>) -> Self {
        Self {
            release,
            prerelease: None,
            build: None,
        }
    }

    pub fn major(&self) -> u64 {
        self.component(0)
    }

    pub fn minor(&self) -> u64 {
        self.component(1)
    }

    pub fn patch(&self) -> u64 {
        self.component(2)
    }

    /// Numeric component at `index`, zero when absent
    pub fn component(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Compare by precedence only (ignores build metadata and component count)
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for index in 0..len {
            match self.component(index).cmp(&other.component(index)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
    }

    /// Same precedence, regardless of how the version was spelled
    pub fn same_precedence(&self, other: &Self) -> bool {
        self.cmp_precedence(other) == Ordering::Equal
    }

    /// Smallest version above every version starting with the first `len` components
    ///
    /// `1.2.3` bumped at 1 gives `2`, at 2 gives `1.3`. `None` when the
    /// bumped component is already `u64::MAX`.
    pub fn bump(&self, len: usize) -> Option<Version> {
        let len = len.max(1);
        let mut release: Vec<u64> = (0..len).map(|i| self.component(i)).collect();
        if let Some(last) = release.last_mut() {
            *last = last.checked_add(1)?;
        }
        Some(Version::from_release(release))
    }

    /// Strip prerelease and build metadata
    pub fn release_only(&self) -> Version {
        Version::from_release(self.release.clone())
    }
}

/// Dot-separated identifiers: numeric ones compare numerically and sort before
/// alphanumeric ones; a shorter list sorts first when all shared fields match.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            },
        }
    }
}

fn is_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .split('.')
            .all(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let unprefixed = input
            .strip_prefix('v')
            .or_else(|| input.strip_prefix('V'))
            .unwrap_or(input);

        // Split on '+' for build metadata
        let (version_part, build) = match unprefixed.split_once('+') {
            Some((v, b)) => (v, Some(b.to_string())),
            None => (unprefixed, None),
        };

        // Split on '-' for prerelease
        let (core_part, prerelease) = match version_part.split_once('-') {
            Some((c, p)) => (c, Some(p.to_string())),
            None => (version_part, None),
        };

        if core_part.is_empty() {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        }

        let release = core_part
            .split('.')
            .map(|component| {
                if component.is_empty() || !component.chars().all(|c| c.is_ascii_digit()) {
                    return Err(VersionError::InvalidNumber {
                        input: input.to_string(),
                        component: component.to_string(),
                    });
                }
                component.parse::<u64>().map_err(|_| VersionError::InvalidNumber {
                    input: input.to_string(),
                    component: component.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(ref pre) = prerelease {
            if !is_identifier(pre) {
                return Err(VersionError::InvalidPrerelease {
                    input: input.to_string(),
                    prerelease: pre.clone(),
                });
            }
        }

        if let Some(ref meta) = build {
            if !is_identifier(meta) {
                return Err(VersionError::InvalidBuild {
                    input: input.to_string(),
                    build: meta.clone(),
                });
            }
        }

        Ok(Version {
            release,
            prerelease,
            build,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = self
            .release
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&release)?;

        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }

        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }

        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Precedence first, then the rendered string so that the order is total
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl VersionId {
    /// Parse a tag or branch name: anything that reads as a version is a release
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match Version::from_str(input) {
            Ok(version) => VersionId::Release(version),
            Err(_) => VersionId::Ref(input.to_string()),
        }
    }

    /// Create a named reference
    pub fn reference(name: impl Into<String>) -> Self {
        VersionId::Ref(name.into())
    }

    pub fn as_release(&self) -> Option<&Version> {
        match self {
            VersionId::Release(version) => Some(version),
            VersionId::Ref(_) => None,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        self.as_release().map_or(false, Version::is_prerelease)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionId::Release(version) => write!(f, "{}", version),
            VersionId::Ref(name) => f.write_str(name),
        }
    }
}

impl From<Version> for VersionId {
    fn from(version: Version) -> Self {
        VersionId::Release(version)
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionId {
    /// Named references sort below every release
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionId::Release(a), VersionId::Release(b)) => a.cmp(b),
            (VersionId::Ref(a), VersionId::Ref(b)) => a.cmp(b),
            (VersionId::Ref(_), VersionId::Release(_)) => Ordering::Less,
            (VersionId::Release(_), VersionId::Ref(_)) => Ordering::Greater,
        }
    }
}

impl Serialize for VersionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(VersionId::parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(input: &str) -> Version {
        Version::from_str(input).unwrap()
    }

    #[test]
    fn test_version_parsing() {
        let version = v("1.2.3");
        assert_eq!(version.release, vec![1, 2, 3]);
        assert_eq!(version.prerelease, None);
        assert_eq!(version.build, None);
    }

    #[test]
    fn test_short_and_long_versions() {
        assert_eq!(v("1.5").release, vec![1, 5]);
        assert_eq!(v("2").release, vec![2]);
        assert_eq!(v("1.2.3.4").release, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_version_prefix_is_accepted() {
        assert_eq!(v("v1.2"), v("1.2"));
        assert_eq!(v("V3").to_string(), "3");
    }

    #[test]
    fn test_version_with_prerelease_and_build() {
        let version = v("1.2.3-alpha.1+build.7");
        assert_eq!(version.prerelease, Some("alpha.1".to_string()));
        assert_eq!(version.build, Some("build.7".to_string()));
        assert_eq!(version.to_string(), "1.2.3-alpha.1+build.7");
    }

    #[test]
    fn test_invalid_versions() {
        assert!(Version::from_str("").is_err());
        assert!(Version::from_str("1..2").is_err());
        assert!(Version::from_str("main").is_err());
        assert!(Version::from_str("1.x").is_err());
        assert!(Version::from_str("1.0-").is_err());
    }

    #[test]
    fn test_precedence_ignores_trailing_zeros() {
        assert!(v("1.5").same_precedence(&v("1.5.0")));
        assert_ne!(v("1.5"), v("1.5.0"));
        // Total order still separates them, lexically
        assert!(v("1.5") < v("1.5.0"));
    }

    #[test]
    fn test_version_comparison() {
        assert!(v("1.0") < v("2.0"));
        assert!(v("1.0") < v("1.1"));
        assert!(v("1.10") > v("1.9"));
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha.2") < v("1.0.0-alpha.10"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
    }

    #[test]
    fn test_bump() {
        assert_eq!(v("1.2.3").bump(1), Some(v("2")));
        assert_eq!(v("1.2.3").bump(2), Some(v("1.3")));
        assert_eq!(v("0.2").bump(3), Some(v("0.2.1")));
        assert_eq!(v("18446744073709551615").bump(1), None);
        assert_eq!(v("1.18446744073709551615").bump(2), None);
        assert_eq!(v("18446744073709551615.3").bump(2), Some(v("18446744073709551615.4")));
    }

    #[test]
    fn test_version_id_parse() {
        assert_eq!(VersionId::parse("1.5"), VersionId::Release(v("1.5")));
        assert_eq!(VersionId::parse("main"), VersionId::Ref("main".to_string()));
        assert_eq!(VersionId::parse("feature/x").to_string(), "feature/x");
    }

    #[test]
    fn test_refs_sort_below_releases() {
        let mut ids = vec![
            VersionId::parse("2.0"),
            VersionId::parse("main"),
            VersionId::parse("1.0"),
            VersionId::parse("develop"),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(rendered, vec!["develop", "main", "1.0", "2.0"]);
    }

    #[test]
    fn test_serde_as_string() {
        let id = VersionId::parse("1.2.0");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1.2.0\"");
        let back: VersionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

//! Effective resolver settings after every configuration layer is applied

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use dyps_core::error::DypsError;

use crate::ConfigResult;

/// Tie-break among candidates that satisfy every constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPreference {
    /// Newest satisfying version
    #[default]
    Highest,
    /// Minimal version selection
    Lowest,
}

impl FromStr for VersionPreference {
    type Err = DypsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highest" => Ok(VersionPreference::Highest),
            "lowest" => Ok(VersionPreference::Lowest),
            other => Err(DypsError::ConfigValidation {
                field: "preference".to_string(),
                reason: format!("expected \"highest\" or \"lowest\", got \"{}\"", other),
            }),
        }
    }
}

impl fmt::Display for VersionPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionPreference::Highest => f.write_str("highest"),
            VersionPreference::Lowest => f.write_str("lowest"),
        }
    }
}

/// Version selection policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub preference: VersionPreference,
    /// Consider prereleases even when a stable version matches
    pub allow_prerelease: bool,
    /// Re-fetches allowed per repository after its speculative fetch
    pub max_refetches: u32,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            preference: VersionPreference::Highest,
            allow_prerelease: false,
            max_refetches: 1,
        }
    }
}

/// Manifest fetch limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Per-fetch deadline
    pub timeout: Duration,
    /// Sibling fetches in flight at once
    pub max_concurrent_fetches: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrent_fetches: 8,
        }
    }
}

/// Exponential backoff for transient fetch failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// No retries at all
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait after `current`, capped at `max_delay`
    pub fn next_delay(&self, current: Duration) -> Duration {
        let scaled = Duration::from_millis((current.as_millis() as f64 * self.multiplier) as u64);
        scaled.min(self.max_delay)
    }
}

/// All settings a resolution run reads
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DypsSettings {
    pub resolver: ResolverSettings,
    pub fetch: FetchSettings,
    pub retry: RetrySettings,
}

impl DypsSettings {
    /// Reject settings no run could work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.fetch.max_concurrent_fetches == 0 {
            return Err(invalid("fetch.max-concurrent-fetches", "must be at least 1"));
        }
        if self.fetch.timeout.is_zero() {
            return Err(invalid("fetch.timeout-ms", "must be greater than zero"));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", "must be at least 1.0"));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(invalid("retry.initial-delay-ms", "must not exceed retry.max-delay-ms"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> DypsError {
    DypsError::ConfigValidation {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

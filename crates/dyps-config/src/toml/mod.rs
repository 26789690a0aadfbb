//! dyps.toml parsing and serialization
//!
//! Every field is optional: a file only overrides what it sets, and the
//! layering in `merge` fills in the rest.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

use dyps_core::error::DypsError;

use crate::settings::{DypsSettings, VersionPreference};
use crate::ConfigResult;

/// Complete dyps.toml configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DypsToml {
    /// Version selection policy
    #[serde(default)]
    pub resolver: ResolverSection,

    /// Manifest fetch limits
    #[serde(default)]
    pub fetch: FetchSection,

    /// Retry policy for transient fetch failures
    #[serde(default)]
    pub retry: RetrySection,
}

/// `[resolver]` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResolverSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference: Option<VersionPreference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_prerelease: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_refetches: Option<u32>,
}

/// `[fetch]` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FetchSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_fetches: Option<usize>,
}

/// `[retry]` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RetrySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

impl DypsToml {
    /// Overlay the fields this file sets onto `settings`
    pub fn apply_to(&self, settings: &mut DypsSettings) {
        let resolver = &self.resolver;
        if let Some(preference) = resolver.preference {
            settings.resolver.preference = preference;
        }
        if let Some(allow) = resolver.allow_prerelease {
            settings.resolver.allow_prerelease = allow;
        }
        if let Some(max) = resolver.max_refetches {
            settings.resolver.max_refetches = max;
        }

        if let Some(ms) = self.fetch.timeout_ms {
            settings.fetch.timeout = Duration::from_millis(ms);
        }
        if let Some(max) = self.fetch.max_concurrent_fetches {
            settings.fetch.max_concurrent_fetches = max;
        }

        let retry = &self.retry;
        if let Some(max) = retry.max_retries {
            settings.retry.max_retries = max;
        }
        if let Some(ms) = retry.initial_delay_ms {
            settings.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = retry.max_delay_ms {
            settings.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = retry.multiplier {
            settings.retry.multiplier = multiplier;
        }
    }
}

/// Parse TOML string to DypsToml configuration
pub fn parse_dyps_toml(content: &str) -> ConfigResult<DypsToml> {
    // First with toml_edit for syntax errors with a location
    content.parse::<toml_edit::DocumentMut>().map_err(|e| {
        let (line, column) = location(content, e.span());
        DypsError::TomlParse {
            message: format!("TOML syntax error: {}", e.message()),
            line,
            column,
        }
    })?;

    // Then with serde for type safety
    let config: DypsToml = toml::from_str(content).map_err(|e| {
        let (line, column) = location(content, e.span());
        DypsError::TomlParse {
            message: e.message().to_string(),
            line,
            column,
        }
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize DypsToml to TOML string
pub fn serialize_dyps_toml(config: &DypsToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| DypsError::TomlParse {
        message: format!("TOML serialization error: {}", e),
        line: 0,
        column: 0,
    })
}

/// Validate the fields a single file sets
pub fn validate_config(config: &DypsToml) -> ConfigResult<()> {
    if config.fetch.max_concurrent_fetches == Some(0) {
        return Err(DypsError::ConfigValidation {
            field: "fetch.max-concurrent-fetches".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if config.fetch.timeout_ms == Some(0) {
        return Err(DypsError::ConfigValidation {
            field: "fetch.timeout-ms".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    if let Some(multiplier) = config.retry.multiplier {
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(DypsError::ConfigValidation {
                field: "retry.multiplier".to_string(),
                reason: format!("must be at least 1.0, got {}", multiplier),
            });
        }
    }

    Ok(())
}

/// Load and parse dyps.toml from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<DypsToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DypsError::io(format!("Failed to read {}", path), e))?;

    parse_dyps_toml(&content).map_err(|e| match e {
        DypsError::TomlParse { message, line, column } => DypsError::TomlParse {
            message: format!("In file {}: {}", path, message),
            line,
            column,
        },
        DypsError::ConfigValidation { field, reason } => DypsError::ConfigValidation {
            field,
            reason: format!("{} (in {})", reason, path),
        },
        other => other,
    })
}

/// 1-based line and column of a byte span start
fn location(content: &str, span: Option<Range<usize>>) -> (usize, usize) {
    let Some(span) = span else {
        return (0, 0);
    };
    let offset = span.start.min(content.len());
    let before = &content.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|index| index + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_dyps_toml("").unwrap();
        assert_eq!(config, DypsToml::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[resolver]
preference = "lowest"
allow-prerelease = true
max-refetches = 2

[fetch]
timeout-ms = 5000
max-concurrent-fetches = 4

[retry]
max-retries = 5
initial-delay-ms = 50
max-delay-ms = 2000
multiplier = 1.5
"#;

        let config = parse_dyps_toml(toml).unwrap();
        assert_eq!(config.resolver.preference, Some(VersionPreference::Lowest));
        assert_eq!(config.resolver.allow_prerelease, Some(true));
        assert_eq!(config.resolver.max_refetches, Some(2));
        assert_eq!(config.fetch.timeout_ms, Some(5000));
        assert_eq!(config.fetch.max_concurrent_fetches, Some(4));
        assert_eq!(config.retry.max_retries, Some(5));
        assert_eq!(config.retry.multiplier, Some(1.5));
    }

    #[test]
    fn test_apply_only_overrides_set_fields() {
        let config = parse_dyps_toml("[fetch]\nmax-concurrent-fetches = 2\n").unwrap();
        let mut settings = DypsSettings::default();
        config.apply_to(&mut settings);

        assert_eq!(settings.fetch.max_concurrent_fetches, 2);
        assert_eq!(settings.fetch.timeout, Duration::from_secs(30));
        assert_eq!(settings.resolver, Default::default());
    }

    #[test]
    fn test_syntax_error_has_location() {
        let toml = "[resolver]\npreference = \n";
        match parse_dyps_toml(toml) {
            Err(DypsError::TomlParse { line, column, .. }) => {
                assert_eq!(line, 2);
                assert!(column > 1);
            },
            other => panic!("expected TomlParse, got {:?}", other),
        }
    }

    #[test]
    fn test_type_error_has_location() {
        let toml = "[fetch]\ntimeout-ms = \"soon\"\n";
        match parse_dyps_toml(toml) {
            Err(DypsError::TomlParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected TomlParse, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(parse_dyps_toml("[resolver]\nstrategy = \"newest\"\n").is_err());
        assert!(parse_dyps_toml("[lockfile]\npath = \"x\"\n").is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse_dyps_toml("[fetch]\nmax-concurrent-fetches = 0\n"),
            Err(DypsError::ConfigValidation { .. })
        ));
        assert!(parse_dyps_toml("[fetch]\ntimeout-ms = 0\n").is_err());
        assert!(parse_dyps_toml("[retry]\nmultiplier = 0.5\n").is_err());
        assert!(parse_dyps_toml("[resolver]\npreference = \"newest\"\n").is_err());
    }

    #[test]
    fn test_round_trip_serialization() {
        let toml = r#"
[resolver]
preference = "highest"
max-refetches = 3

[retry]
multiplier = 2.5
"#;

        let config = parse_dyps_toml(toml).unwrap();
        let serialized = serialize_dyps_toml(&config).unwrap();
        let reparsed = parse_dyps_toml(&serialized).unwrap();

        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_location_counts_from_one() {
        assert_eq!(location("abc\ndef", Some(5..6)), (2, 2));
        assert_eq!(location("abc", Some(0..1)), (1, 1));
        assert_eq!(location("abc", None), (0, 0));
    }

    #[tokio::test]
    async fn test_load_from_missing_file() {
        let error = load_from_file(Utf8Path::new("/nonexistent/dyps.toml")).await.unwrap_err();
        assert!(matches!(error, DypsError::Io { .. }));
    }
}

//! Configuration layering, fallback logic, and environment overrides
//!
//! Lowest to highest priority: defaults, global file, project file,
//! `DYPS_*` environment variables, explicit overrides.

use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use dyps_core::error::DypsError;

use crate::settings::{DypsSettings, VersionPreference};
use crate::toml::DypsToml;
use crate::ConfigResult;

/// Project configuration file name
pub const CONFIG_FILE_NAME: &str = "dyps.toml";

/// Environment variables and the override keys they map to
const ENV_KEYS: &[(&str, &str)] = &[
    ("DYPS_PREFERENCE", "preference"),
    ("DYPS_ALLOW_PRERELEASE", "allow-prerelease"),
    ("DYPS_MAX_REFETCHES", "max-refetches"),
    ("DYPS_FETCH_TIMEOUT_MS", "timeout-ms"),
    ("DYPS_MAX_CONCURRENT_FETCHES", "max-concurrent-fetches"),
    ("DYPS_MAX_RETRIES", "max-retries"),
];

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Global config file, when one is known
    global_path: Option<Utf8PathBuf>,
}

/// Configuration layering and merging
#[derive(Debug, Default)]
pub struct ConfigLayering {
    /// Global configuration
    global_config: Option<DypsToml>,
    /// Project configuration
    project_config: Option<DypsToml>,
    /// Environment overrides
    env_overrides: HashMap<String, String>,
    /// Programmatic overrides
    overrides: HashMap<String, String>,
}

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Global config file
    Global(Utf8PathBuf),
    /// Project dyps.toml file
    Project(Utf8PathBuf),
}

impl ConfigLoader {
    /// Create a new configuration loader using the platform config directory
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self {
            cwd,
            global_path: default_global_path(),
        }
    }

    /// Use an explicit global config file instead of the platform default
    pub fn with_global_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    /// Find configuration file in project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        let mut current = Some(self.cwd.as_path());

        while let Some(dir) = current {
            let config_path = dir.join(filename);
            if config_path.is_file() {
                return Some(config_path);
            }
            current = dir.parent();
        }

        None
    }

    /// Load the nearest dyps.toml, if any
    pub async fn load_project_config(&self) -> ConfigResult<Option<(DypsToml, ConfigSource)>> {
        let Some(path) = self.resolve_config_path(CONFIG_FILE_NAME) else {
            debug!(cwd = %self.cwd, "no project configuration found");
            return Ok(None);
        };

        let config = crate::toml::load_from_file(&path).await?;
        debug!(path = %path, "loaded project configuration");
        Ok(Some((config, ConfigSource::Project(path))))
    }

    /// Load global configuration
    pub async fn load_global_config(&self) -> ConfigResult<Option<(DypsToml, ConfigSource)>> {
        let Some(path) = &self.global_path else {
            return Ok(None);
        };

        if !path.is_file() {
            return Ok(None);
        }

        let config = crate::toml::load_from_file(path).await?;
        debug!(path = %path, "loaded global configuration");
        Ok(Some((config, ConfigSource::Global(path.clone()))))
    }

    /// Load every layer and produce validated settings
    pub async fn load(&self, overrides: HashMap<String, String>) -> ConfigResult<DypsSettings> {
        let global = self.load_global_config().await?.map(|(config, _)| config);
        let project = self.load_project_config().await?.map(|(config, _)| config);

        ConfigLayering::new()
            .with_global(global)
            .with_project(project)
            .with_env(ConfigLayering::collect_env_overrides())
            .with_overrides(overrides)
            .merge()
    }
}

/// `<config dir>/dyps/config.toml`
fn default_global_path() -> Option<Utf8PathBuf> {
    let config_dir = dirs::config_dir()?;
    let config_dir = Utf8PathBuf::try_from(config_dir).ok()?;
    Some(config_dir.join("dyps").join("config.toml"))
}

impl ConfigLayering {
    /// Create a new configuration layering system
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, config: Option<DypsToml>) -> Self {
        self.global_config = config;
        self
    }

    pub fn with_project(mut self, config: Option<DypsToml>) -> Self {
        self.project_config = config;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env_overrides = env;
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Merge every layer over the defaults and validate the result
    pub fn merge(&self) -> ConfigResult<DypsSettings> {
        let mut settings = DypsSettings::default();

        if let Some(global) = &self.global_config {
            global.apply_to(&mut settings);
        }
        if let Some(project) = &self.project_config {
            project.apply_to(&mut settings);
        }

        Self::apply_env_overrides(&mut settings, &self.env_overrides)?;

        // Programmatic overrides (highest priority)
        for (key, value) in sorted(&self.overrides) {
            apply_override(&mut settings, key, value, key)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(
        settings: &mut DypsSettings,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (variable, key) in ENV_KEYS {
            if let Some(value) = overrides.get(*variable) {
                apply_override(settings, key, value, variable)?;
            }
        }
        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with("DYPS_"))
            .collect()
    }
}

/// Iterate a map in key order so errors are reproducible
fn sorted(map: &HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    entries
}

/// Apply one `key = value` override; `origin` names the setting in errors
fn apply_override(
    settings: &mut DypsSettings,
    key: &str,
    value: &str,
    origin: &str,
) -> ConfigResult<()> {
    match key {
        "preference" => {
            settings.resolver.preference = value.parse::<VersionPreference>().map_err(|_| {
                invalid(origin, format!("expected \"highest\" or \"lowest\", got \"{}\"", value))
            })?;
        },
        "allow-prerelease" => settings.resolver.allow_prerelease = parse_bool(origin, value)?,
        "max-refetches" => settings.resolver.max_refetches = parse_number(origin, value)?,
        "timeout-ms" => settings.fetch.timeout = Duration::from_millis(parse_number(origin, value)?),
        "max-concurrent-fetches" => {
            settings.fetch.max_concurrent_fetches = parse_number(origin, value)?
        },
        "max-retries" => settings.retry.max_retries = parse_number(origin, value)?,
        "initial-delay-ms" => {
            settings.retry.initial_delay = Duration::from_millis(parse_number(origin, value)?)
        },
        "max-delay-ms" => {
            settings.retry.max_delay = Duration::from_millis(parse_number(origin, value)?)
        },
        "multiplier" => settings.retry.multiplier = parse_number(origin, value)?,
        other => return Err(invalid(origin, format!("unknown setting \"{}\"", other))),
    }
    Ok(())
}

fn parse_bool(origin: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(origin, format!("expected a boolean, got \"{}\"", value))),
    }
}

fn parse_number<T>(origin: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| invalid(origin, format!("\"{}\": {}", value, e)))
}

fn invalid(field: &str, reason: String) -> DypsError {
    DypsError::ConfigValidation {
        field: field.to_string(),
        reason,
    }
}

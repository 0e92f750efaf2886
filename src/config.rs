use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{API_BASE_URL_ENV, DEFAULT_API_BASE_URL, DEFAULT_POPULAR_DISTRICTS, LOG_DIR_ENV};
use crate::error::{DashboardError, Result};
use crate::stats::AggregateOptions;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analytics: AggregateOptions,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Districts listed in the headline stats
    pub popular_districts: usize,
    /// Events inspected by `validate` when no limit is given
    pub validation_limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            popular_districts: DEFAULT_POPULAR_DISTRICTS,
            validation_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub filter: String,
    /// Directory for daily JSON log files; console only when unset
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "seoul_now=info".to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
}

impl Config {
    /// Load `config.toml` from the working directory, or defaults when it is absent.
    pub fn load() -> Result<Self> {
        Self::load_optional(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default().with_env_overrides());
        }
        Self::load_from(path)
    }

    /// Load from `path`; a missing file is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config = Self::from_toml(&config_content)?;
        Ok(config.with_env_overrides())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(-12..=14).contains(&self.analytics.utc_offset_hours) {
            return Err(DashboardError::Config(format!(
                "analytics.utc_offset_hours out of range: {}",
                self.analytics.utc_offset_hours
            )));
        }
        if self.analytics.timeline_months == 0 {
            return Err(DashboardError::Config(
                "analytics.timeline_months must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = non_empty_env(API_BASE_URL_ENV) {
            self.api.base_url = Some(url);
        }
        if let Some(dir) = non_empty_env(LOG_DIR_ENV) {
            self.logging.dir = Some(PathBuf::from(dir));
        }
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Composition root for the CLI: owns the configuration and values derived
/// from it that are resolved at most once.
#[derive(Debug)]
pub struct AppContext {
    config: Config,
    api_base_url: OnceCell<String>,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            api_base_url: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Base URL of the events API, without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.get_or_init(|| {
            let url = self
                .config
                .api
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE_URL)
                .trim()
                .trim_end_matches('/')
                .to_string();
            debug!(%url, "Resolved API base URL");
            url
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.analytics, AggregateOptions::default());
        assert_eq!(config.analytics.top_districts, 5);
        assert_eq!(config.analytics.top_categories, 8);
        assert_eq!(config.display.popular_districts, 6);
        assert_eq!(config.logging.filter, "seoul_now=info");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [analytics]
            top_categories = 3
            utc_offset_hours = 0

            [api]
            base_url = "https://example.com/api/"
            "#,
        )
        .unwrap();
        assert_eq!(config.analytics.top_categories, 3);
        assert_eq!(config.analytics.top_districts, 5);
        assert_eq!(config.analytics.utc_offset_hours, 0);

        let context = AppContext::new(config);
        assert_eq!(context.api_base_url(), "https://example.com/api");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_toml("[analytics]\nutc_offset_hours = 30"),
            Err(DashboardError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[analytics]\ntimeline_months = 0"),
            Err(DashboardError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[analytics]\ntop_districts = \"five\""),
            Err(DashboardError::Toml(_))
        ));
    }

    #[test]
    fn test_api_base_url_is_memoized() {
        let context = AppContext::new(Config::default());
        let first = context.api_base_url() as *const str;
        let second = context.api_base_url() as *const str;
        assert_eq!(first, second);
    }
}

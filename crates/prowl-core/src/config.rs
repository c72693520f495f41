//! Configuration management for Prowl.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Domain;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/prowl/config.toml` (or platform equivalent)
/// unless an explicit path is given. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Crawl budgets and thresholds
    pub crawl: CrawlConfig,
    /// Rendering engine settings
    pub browser: BrowserConfig,
    /// Result export settings
    pub output: OutputConfig,
    /// Extra rule tables
    pub rules: RulesConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults
    /// if no file exists there.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `PROWL_HEADLESS`: Override browser headless mode (true/false)
    /// - `PROWL_MAX_URLS`: Override `crawl.max_urls_per_domain`
    /// - `PROWL_MAX_DEPTH`: Override `crawl.max_depth`
    /// - `PROWL_GLOBAL_TIMEOUT_SECS`: Override `crawl.global_timeout_secs`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("PROWL_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("PROWL_MAX_URLS") {
            if let Ok(max) = val.parse() {
                self.crawl.max_urls_per_domain = max;
                tracing::debug!("Override crawl.max_urls_per_domain from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("PROWL_MAX_DEPTH") {
            if let Ok(depth) = val.parse() {
                self.crawl.max_depth = depth;
                tracing::debug!("Override crawl.max_depth from env: {}", depth);
            }
        }

        if let Ok(val) = std::env::var("PROWL_GLOBAL_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.crawl.global_timeout_secs = secs;
                tracing::debug!("Override crawl.global_timeout_secs from env: {}", secs);
            }
        }

        self
    }

    /// Check budgets and thresholds for values the crawler cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        let crawl = &self.crawl;

        if crawl.max_urls_per_domain == 0 {
            return Err(invalid("crawl.max_urls_per_domain", "must be at least 1"));
        }
        if crawl.max_scroll_attempts == 0 {
            return Err(invalid("crawl.max_scroll_attempts", "must be at least 1"));
        }
        if crawl.global_timeout_secs == 0 {
            return Err(invalid("crawl.global_timeout_secs", "must be at least 1"));
        }
        if crawl.captcha_ceiling_secs == 0 {
            return Err(invalid("crawl.captcha_ceiling_secs", "must be at least 1"));
        }

        for (field, value) in [
            ("crawl.record_threshold", crawl.record_threshold),
            ("crawl.halt_threshold", crawl.halt_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(field, &format!("must be in (0, 1], got {value}")));
            }
        }

        if crawl.record_threshold > crawl.halt_threshold {
            return Err(invalid(
                "crawl.record_threshold",
                "must not exceed crawl.halt_threshold",
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = crawl.domains.iter().find(|d| !seen.insert(d.as_str())) {
            return Err(invalid(
                "crawl.domains",
                &format!("{} is listed more than once", dup.as_str()),
            ));
        }

        if let Some((min, max)) = crawl.politeness_delay_ms {
            if min > max {
                return Err(invalid(
                    "crawl.politeness_delay_ms",
                    "lower bound must not exceed upper bound",
                ));
            }
        }

        Ok(())
    }

    /// Save configuration to disk at the default location.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/prowl/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "prowl", "prowl").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Crawl budgets, retry policy and classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Domains to crawl, bare (`amazon.in`) or as entry URLs
    pub domains: Vec<Domain>,
    /// Navigation retries after the first failed attempt
    pub max_retries: u32,
    /// Linear backoff unit in seconds (`retry_delay * (attempt + 1)`)
    pub retry_delay_secs: u64,
    /// Wall-clock budget for infinite-scroll handling on one page
    pub scroll_timeout_secs: u64,
    /// Maximum scroll attempts on one page
    pub max_scroll_attempts: u32,
    /// Wait for dynamic content (network idle, marker probes, load-more settle)
    pub dynamic_wait_secs: u64,
    /// Settle interval after each scroll in milliseconds
    pub scroll_settle_ms: u64,
    /// Maximum pages visited (and product URLs recorded) per domain
    pub max_urls_per_domain: usize,
    /// Maximum link distance from the entry URL
    pub max_depth: u32,
    /// Timeout for the whole multi-domain batch
    pub global_timeout_secs: u64,
    /// Optional soft wall-clock limit per domain
    pub domain_time_limit_secs: Option<u64>,
    /// Ceiling wait for out-of-band CAPTCHA resolution
    pub captcha_ceiling_secs: u64,
    /// Minimum confidence for a page to be recorded as a product
    pub record_threshold: f64,
    /// Minimum confidence to stop descending from a product page
    pub halt_threshold: f64,
    /// Optional randomized pause between page visits, `(min, max)` in ms
    pub politeness_delay_ms: Option<(u64, u64)>,
}

impl CrawlConfig {
    /// Linear backoff unit.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Scroll wall-clock budget.
    #[must_use]
    pub fn scroll_timeout(&self) -> Duration {
        Duration::from_secs(self.scroll_timeout_secs)
    }

    /// Dynamic content wait.
    #[must_use]
    pub fn dynamic_wait(&self) -> Duration {
        Duration::from_secs(self.dynamic_wait_secs)
    }

    /// Scroll settle interval.
    #[must_use]
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    /// Global batch timeout.
    #[must_use]
    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }

    /// Per-domain soft limit, if any.
    #[must_use]
    pub fn domain_time_limit(&self) -> Option<Duration> {
        self.domain_time_limit_secs.map(Duration::from_secs)
    }

    /// CAPTCHA resolution ceiling.
    #[must_use]
    pub fn captcha_ceiling(&self) -> Duration {
        Duration::from_secs(self.captcha_ceiling_secs)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            max_retries: 3,
            retry_delay_secs: 5,
            scroll_timeout_secs: 30,
            max_scroll_attempts: 10,
            dynamic_wait_secs: 5,
            scroll_settle_ms: 1000,
            max_urls_per_domain: 500,
            max_depth: 3,
            global_timeout_secs: 3600,
            domain_time_limit_secs: None,
            captcha_ceiling_secs: 120,
            record_threshold: 0.5,
            halt_threshold: 0.7,
            politeness_delay_ms: None,
        }
    }
}

/// Which rendering engine fetches pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowserKind {
    /// Headless Chromium over CDP
    Chromium,
    /// Plain HTTP fetch with HTML parsing, no script execution
    Static,
}

/// Rendering engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Engine used for every domain session
    pub engine: BrowserKind,
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// DOM-ready navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Best-effort network idle wait in seconds
    pub network_idle_timeout_secs: u64,
    /// Fixed user agent; randomized per session when unset
    pub user_agent: Option<String>,
}

impl BrowserConfig {
    /// Navigation timeout.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Network idle timeout.
    #[must_use]
    pub fn network_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.network_idle_timeout_secs)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: BrowserKind::Chromium,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 60,
            network_idle_timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// Result export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON file the per-domain product URLs are written to
    pub results_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: PathBuf::from("product_urls.json"),
        }
    }
}

/// Extra rule tables layered over the built-ins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// TOML file with additional exclusions and pattern tables
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.crawl.max_retries, 3);
        assert_eq!(config.crawl.retry_delay_secs, 5);
        assert_eq!(config.crawl.scroll_timeout_secs, 30);
        assert_eq!(config.crawl.max_scroll_attempts, 10);
        assert_eq!(config.crawl.dynamic_wait_secs, 5);
        assert_eq!(config.browser.engine, BrowserKind::Chromium);
        assert!(config.browser.headless);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = AppConfig::default();
        config.crawl.domains = vec![Domain::parse("amazon.in").expect("valid domain")];

        let toml_str = toml::to_string_pretty(&config).expect("serialize config");
        assert!(toml_str.contains("[crawl]"));
        assert!(toml_str.contains("[browser]"));
        assert!(toml_str.contains("[output]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.crawl.domains, config.crawl.domains);
        assert_eq!(parsed.crawl.max_depth, config.crawl.max_depth);
    }

    #[test]
    fn test_config_load_from() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
[crawl]
domains = ["amazon.in", "https://flipkart.com"]
max_urls_per_domain = 50
"#,
        )
        .expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.crawl.domains.len(), 2);
        assert_eq!(loaded.crawl.domains[1].as_str(), "flipkart.com");
        assert_eq!(loaded.crawl.max_urls_per_domain, 50);
        // Untouched fields keep their defaults
        assert_eq!(loaded.crawl.max_retries, 3);
    }

    #[test]
    fn test_config_load_from_missing() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load_from(&tmp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_config_rejects_bad_domain() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
[crawl]
domains = ["not a domain"]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_thresholds() {
        let mut config = AppConfig::default();
        config.crawl.record_threshold = 0.8;
        config.crawl.halt_threshold = 0.7;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.crawl.halt_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.crawl.max_urls_per_domain = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.crawl.politeness_delay_ms = Some((500, 100));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_same_host_twice() {
        let mut config = AppConfig::default();
        config.crawl.domains = vec![
            Domain::parse("shop.example").unwrap(),
            Domain::parse("https://www.shop.example").unwrap(),
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shop.example"), "{err}");

        config.crawl.domains.pop();
        config
            .crawl
            .domains
            .push(Domain::parse("amazon.in").unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("PROWL_MAX_DEPTH", "7");
        std::env::set_var("PROWL_HEADLESS", "false");

        let config = AppConfig::default().with_env_overrides();
        assert_eq!(config.crawl.max_depth, 7);
        assert!(!config.browser.headless);

        std::env::remove_var("PROWL_MAX_DEPTH");
        std::env::remove_var("PROWL_HEADLESS");
    }
}

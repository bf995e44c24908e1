// src/config.rs
// =============================================================================
// Application configuration, loaded in layers with `figment`:
//
//   1. Built-in defaults (AppConfig::default)
//   2. TOML file, if LINK_CHECKER_CONFIG_FILE or --config points at one
//   3. Environment variables prefixed with LINK_CHECKER_
//
// Later layers win. CLI flags are applied on top of the result in main.rs.
//
// Example TOML:
//
//   moodle_base_url = "https://lms.example.org"
//   moodle_token = "..."
//   concurrency = 20
//
//   [[skip_rules]]
//   domain = "figma.com"
//   reason = "Figma link (validation skipped)"
// =============================================================================

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "LINK_CHECKER_";
pub const CONFIG_FILE_ENV: &str = "LINK_CHECKER_CONFIG_FILE";

// One year
const MAX_CACHE_TTL_HOURS: u64 = 24 * 365;

// Some servers reject requests that don't look like they come from a browser
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// A host whose links are reported valid without being probed.
///
/// Some hosts (design tools mostly) answer automated requests with errors
/// even though the page works in a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    /// Matches this host and any of its subdomains
    pub domain: String,
    /// Stored as the status message of skipped links
    pub reason: String,
}

impl SkipRule {
    pub fn new(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let domain = self.domain.trim_end_matches('.').to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Moodle site root, e.g. https://lms.example.org
    #[serde(default)]
    pub moodle_base_url: Option<String>,

    /// Web service token sent as `wstoken`
    #[serde(default)]
    pub moodle_token: Option<String>,

    /// Per-request timeout and total budget for one link check, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum simultaneous in-flight checks
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_skip_rules")]
    pub skip_rules: Vec<SkipRule>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_concurrency() -> usize {
    10
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_skip_rules() -> Vec<SkipRule> {
    vec![SkipRule::new("figma.com", "Figma link (validation skipped)")]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            moodle_base_url: None,
            moodle_token: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            concurrency: default_concurrency(),
            cache_ttl_hours: default_cache_ttl_hours(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            skip_rules: default_skip_rules(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional TOML file and the
    /// environment, then validate it.
    ///
    /// `config_file` takes precedence over LINK_CHECKER_CONFIG_FILE.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(60 * 60))
    }

    /// Moodle base URL, required by every command that talks to Moodle.
    pub fn require_moodle_base_url(&self) -> Result<&str, ConfigError> {
        self.moodle_base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "moodle_base_url".into(),
                hint: "set LINK_CHECKER_MOODLE_BASE_URL or pass --moodle-url".into(),
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 || self.timeout_secs > 600 {
            return Err(invalid("timeout_secs", "must be between 1 and 600"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(invalid("connect_timeout_secs", "must be greater than 0"));
        }
        if self.concurrency == 0 || self.concurrency > 500 {
            return Err(invalid("concurrency", "must be between 1 and 500"));
        }
        if self.max_redirects > 50 {
            return Err(invalid("max_redirects", "must not exceed 50"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if let Some(rule) = self.skip_rules.iter().find(|r| r.domain.trim().is_empty()) {
            return Err(invalid(
                "skip_rules",
                &format!("rule with reason '{}' has an empty domain", rule.reason),
            ));
        }
        if self.cache_ttl_hours > MAX_CACHE_TTL_HOURS {
            return Err(invalid(
                "cache_ttl_hours",
                &format!("must not exceed {} (one year)", MAX_CACHE_TTL_HOURS),
            ));
        }
        if self.cache_ttl_hours == 0 {
            tracing::warn!("cache_ttl_hours is 0; every read will re-validate all links");
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

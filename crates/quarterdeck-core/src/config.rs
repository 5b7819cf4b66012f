//! Console configuration.
//!
//! Configuration priority: environment variables first, then an optional
//! TOML file for the less common knobs. Only the base URL and the bearer
//! token are mandatory.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};

fn default_retry_attempts() -> u32 {
    3
}
fn default_page_size() -> usize {
    8
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_backoff_cap_secs() -> u64 {
    10
}
fn default_max_idle_connections() -> usize {
    2
}
fn default_keepalive_secs() -> u64 {
    10
}

/// Everything the gateway and engine need to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Base URL of the remote management API, e.g. `http://panel:3000/api`.
    pub api_base_url: String,
    /// Bearer credential attached to every request.
    pub api_token: String,
    /// Operator allow-list.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    /// Attempts per logical request (first try included).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Entities per rendered page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Cap on the exponential backoff between retries.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Bounded connection pool: idle connections kept per host.
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,
    /// Bounded connection pool: keep-alive lifetime.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl ConsoleConfig {
    /// Loads configuration from `QUARTERDECK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when the base URL or token is missing.
    pub fn from_env() -> Result<Self> {
        let api_base_url = env::var("QUARTERDECK_API_BASE_URL")
            .map_err(|_| ConsoleError::config("QUARTERDECK_API_BASE_URL is not set"))?;
        let api_token = env::var("QUARTERDECK_API_TOKEN")
            .map_err(|_| ConsoleError::config("QUARTERDECK_API_TOKEN is not set"))?;
        let admin_ids = env::var("QUARTERDECK_ADMIN_IDS")
            .map(|raw| Self::parse_admin_ids(&raw))
            .unwrap_or_default();

        Ok(Self {
            api_base_url,
            api_token,
            admin_ids,
            retry_attempts: default_retry_attempts(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            max_idle_connections: default_max_idle_connections(),
            keepalive_secs: default_keepalive_secs(),
        })
    }

    /// Parses a TOML document, applying the serde defaults for any knob the
    /// file leaves out.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Lenient comma-separated id parsing: bad entries are logged and
    /// skipped rather than failing startup.
    pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!(entry = s, "ignoring unparseable admin id");
                    None
                }
            })
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

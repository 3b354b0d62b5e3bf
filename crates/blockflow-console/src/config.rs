//! Console configuration: defaults, then `blockflow.toml`, then environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use blockflow_client::dashboard::{DEFAULT_HN_URL, DEFAULT_QUOTE_SYMBOL};
use blockflow_client::DEFAULT_API_URL;
use blockflow_state::DEFAULT_POLL_INTERVAL;
use serde::{Deserialize, Serialize};

/// File read when `BLOCKFLOW_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "blockflow.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "BLOCKFLOW_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the block/flow backend.
    pub api_url: String,

    /// Refresh period for a flow waiting on input.
    pub poll_interval_ms: u64,

    /// Per-request timeout; none by default.
    pub request_timeout_ms: Option<u64>,

    /// Hacker News API root.
    pub hn_url: String,

    /// Quote endpoint, queried as `{quote_url}/{symbol}`.
    pub quote_url: Option<String>,

    pub quote_symbol: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            request_timeout_ms: None,
            hn_url: DEFAULT_HN_URL.to_string(),
            quote_url: None,
            quote_symbol: DEFAULT_QUOTE_SYMBOL.to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Load from the process environment and the working directory.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if explicit.is_some() {
            bail!("config file {} does not exist", path.display());
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply `BLOCKFLOW_*` overrides looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("BLOCKFLOW_API_URL") {
            self.api_url = url;
        }
        if let Some(ms) = lookup("BLOCKFLOW_POLL_INTERVAL_MS") {
            self.poll_interval_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("BLOCKFLOW_POLL_INTERVAL_MS is not a number: {ms}"))?;
        }
        if let Some(ms) = lookup("BLOCKFLOW_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = Some(
                ms.trim()
                    .parse()
                    .with_context(|| format!("BLOCKFLOW_REQUEST_TIMEOUT_MS is not a number: {ms}"))?,
            );
        }
        if let Some(url) = lookup("BLOCKFLOW_HN_URL") {
            self.hn_url = url;
        }
        if let Some(url) = lookup("BLOCKFLOW_QUOTE_URL") {
            self.quote_url = (!url.trim().is_empty()).then_some(url);
        }
        if let Some(symbol) = lookup("BLOCKFLOW_QUOTE_SYMBOL") {
            self.quote_symbol = symbol;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.request_timeout_ms == Some(0) {
            bail!("request_timeout_ms must be greater than zero");
        }
        if self.quote_symbol.trim().is_empty() {
            bail!("quote_symbol must not be empty");
        }

        let urls = [
            ("api_url", Some(&self.api_url)),
            ("hn_url", Some(&self.hn_url)),
            ("quote_url", self.quote_url.as_ref()),
        ];
        for (name, url) in urls {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    bail!("{name} must start with http:// or https://, got {url:?}");
                }
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

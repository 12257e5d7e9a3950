use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Context, DriverError};

pub const DEFAULT_URL: &str = "127.0.0.1:8081";
pub const ENV_URL: &str = "DOCDB_URL";
pub const ENV_TIMEOUT_MS: &str = "DOCDB_TIMEOUT_MS";

/// Driver connection settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub url: String,
    /// Per-call timeout applied by [`DriverConfig::context`]
    pub timeout_ms: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { url: DEFAULT_URL.to_string(), timeout_ms: None }
    }
}

impl DriverConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    pub fn from_json(s: &str) -> Result<Self, DriverError> {
        serde_json::from_str(s).map_err(|e| DriverError::invalid_argument(format!("driver config: {e}")))
    }

    /// Defaults overridden by `DOCDB_URL` and `DOCDB_TIMEOUT_MS` when set.
    pub fn from_env() -> Result<Self, DriverError> {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var(ENV_URL) {
            cfg.url = url;
        }
        if let Ok(ms) = std::env::var(ENV_TIMEOUT_MS) {
            let ms = ms
                .trim()
                .parse::<u64>()
                .map_err(|e| DriverError::invalid_argument(format!("{ENV_TIMEOUT_MS}={ms:?}: {e}")))?;
            cfg.timeout_ms = Some(ms);
        }
        Ok(cfg)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn context(&self) -> Context {
        match self.timeout() {
            Some(t) => Context::with_timeout(t),
            None => Context::background(),
        }
    }
}

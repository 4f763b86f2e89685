//! Downstream service endpoints loading and validation.

use crate::{Error, Result};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Base URLs of the services the pipeline calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub execution_url: String,
    pub charts_url: String,
    pub alerts_url: String,
    pub scheduler_url: String,
    pub timeout_secs: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::Configuration(format!("{} not set", key)))
        };
        let execution_url = required("VIGIL_EXECUTION_URL")?;
        let charts_url = required("VIGIL_CHARTS_URL")?;
        let alerts_url = required("VIGIL_ALERTS_URL")?;
        let scheduler_url = required("VIGIL_SCHEDULER_URL")?;
        let timeout_secs = match lookup("VIGIL_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                Error::Configuration(format!("VIGIL_HTTP_TIMEOUT_SECS is invalid: {}", e))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let cfg = Self {
            execution_url,
            charts_url,
            alerts_url,
            scheduler_url,
            timeout_secs,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("execution_url", &self.execution_url),
            ("charts_url", &self.charts_url),
            ("alerts_url", &self.alerts_url),
            ("scheduler_url", &self.scheduler_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(Error::Configuration(format!(
                    "{} must be a valid HTTP(S) URL",
                    name
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(Error::Configuration("timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Shared HTTP client honoring the configured timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))
    }
}

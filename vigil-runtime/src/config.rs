//! Pipeline configuration

use crate::{Error, Result};
use chrono::Duration;
use std::env;

const DEFAULT_SLEEP_WINDOW_HOURS: i64 = 24;
const DEFAULT_AUTOMATIC_LOOKBACK_MINUTES: i64 = 5;

/// Tunables for the trigger and alerting paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Alerts for a suite are suppressed for this long after one was sent
    pub sleep_window: Duration,
    /// Staleness window for automatic qualitative suites
    pub automatic_lookback_minutes: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sleep_window: Duration::hours(DEFAULT_SLEEP_WINDOW_HOURS),
            automatic_lookback_minutes: DEFAULT_AUTOMATIC_LOOKBACK_MINUTES,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `VIGIL_SLEEP_WINDOW_HOURS`: alert suppression window (default: 24)
    /// - `VIGIL_AUTOMATIC_LOOKBACK_MINUTES`: automatic staleness window (default: 5)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let hours = parse_or(
            lookup("VIGIL_SLEEP_WINDOW_HOURS"),
            "VIGIL_SLEEP_WINDOW_HOURS",
            DEFAULT_SLEEP_WINDOW_HOURS,
        )?;
        let minutes = parse_or(
            lookup("VIGIL_AUTOMATIC_LOOKBACK_MINUTES"),
            "VIGIL_AUTOMATIC_LOOKBACK_MINUTES",
            DEFAULT_AUTOMATIC_LOOKBACK_MINUTES,
        )?;

        let sleep_window = Duration::try_hours(hours).ok_or_else(|| {
            Error::Validation(format!(
                "VIGIL_SLEEP_WINDOW_HOURS out of range: {}",
                hours
            ))
        })?;

        let config = Self {
            sleep_window,
            automatic_lookback_minutes: minutes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sleep_window < Duration::zero() {
            return Err(Error::Validation(
                "sleep_window cannot be negative".to_string(),
            ));
        }
        if self.automatic_lookback_minutes <= 0 {
            return Err(Error::Validation(
                "automatic_lookback_minutes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or(value: Option<String>, key: &str, default: i64) -> Result<i64> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("{} must be an integer, got '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.sleep_window, Duration::hours(24));
        assert_eq!(config.automatic_lookback_minutes, 5);
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("VIGIL_SLEEP_WINDOW_HOURS", "6"),
            ("VIGIL_AUTOMATIC_LOOKBACK_MINUTES", "15"),
        ]))
        .unwrap();
        assert_eq!(config.sleep_window, Duration::hours(6));
        assert_eq!(config.automatic_lookback_minutes, 15);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PipelineConfig::from_lookup(lookup(&[("VIGIL_SLEEP_WINDOW_HOURS", "soon")])).is_err());
        assert!(
            PipelineConfig::from_lookup(lookup(&[("VIGIL_AUTOMATIC_LOOKBACK_MINUTES", "0")]))
                .is_err()
        );
    }

    #[test]
    fn test_out_of_range_sleep_window_is_rejected() {
        let result = PipelineConfig::from_lookup(lookup(&[(
            "VIGIL_SLEEP_WINDOW_HOURS",
            "9223372036854775807",
        )]));
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}

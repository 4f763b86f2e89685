//! Tracing subscriber setup for the CLI.
//!
//! ```bash
//! export VIGIL_LOG_FORMAT=json   # json|text (default: text)
//! export RUST_LOG=vigil=debug    # overrides the default filter
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl TracingConfig {
    pub fn from_environment(verbose: bool) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    fn from_lookup(verbose: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup("VIGIL_LOG_FORMAT").map(|v| v.to_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let level = if verbose { "debug" } else { "info" };
        Self {
            format,
            default_filter: format!(
                "vigil={level},vigil_runtime={level},vigil_storage={level},vigil_cloud={level}"
            ),
        }
    }
}

pub fn init_tracing(config: &TracingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.default_filter.as_str().into());

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_default() {
        let config = TracingConfig::from_lookup(false, |_| None);
        assert_eq!(config.format, LogFormat::Text);
        assert!(config.default_filter.contains("vigil_runtime=info"));
    }

    #[test]
    fn test_json_format_and_verbose_filter() {
        let config = TracingConfig::from_lookup(true, |key| {
            (key == "VIGIL_LOG_FORMAT").then(|| "JSON".to_string())
        });
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.default_filter.contains("vigil_storage=debug"));
    }
}

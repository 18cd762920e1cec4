//! Process-wide log setup for the binaries.
//!
//! `tracing` events go through a `tracing-subscriber` registry. Records from
//! the `log` facade are bridged in with `LogTracer`, so both end up in one
//! stream filtered by `RUST_LOG` (default [`DEFAULT_FILTER`]).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::error::FinsightError;

pub const DEFAULT_FILTER: &str = "finsight=info";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON lines; anything else is text.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => Self::Json,
            _ => Self::Text,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("finsight=debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}

/// Installs the global subscriber. Logs go to stderr so `analyze` output
/// on stdout stays clean.
pub fn init_logging(format: LogFormat, verbose: bool) -> Result<(), FinsightError> {
    tracing_log::LogTracer::init().map_err(|e| FinsightError::Logging(e.to_string()))?;

    let registry = Registry::default().with(env_filter(verbose));
    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };
    installed.map_err(|e| FinsightError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Text);
        assert_eq!(LogFormat::parse(None), LogFormat::Text);
    }
}

//! Tracing subscriber setup.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), &config.level)?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?,
    }
    Ok(())
}

fn build_filter(overridden: Option<String>, level: &str) -> Result<EnvFilter, TelemetryError> {
    match overridden {
        Some(directive) if !directive.is_empty() => Ok(EnvFilter::try_new(directive)?),
        _ => Ok(EnvFilter::try_new(level)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_rejected() {
        assert!(matches!(
            build_filter(None, "chat_backbone=loud"),
            Err(TelemetryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let filter = build_filter(Some("warn".to_string()), "chat_backbone=loud").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn empty_override_falls_back_to_level() {
        assert!(build_filter(Some(String::new()), &LoggingConfig::default().level).is_ok());
    }
}

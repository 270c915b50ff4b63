//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingSection};
use crate::error::{LiftlogError, Result};

/// Build the event filter. `RUST_LOG` wins over the configured directives.
pub fn build_filter(logging: &LoggingSection) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&logging.filter).map_err(|e| {
        LiftlogError::Config(format!("Invalid log filter '{}': {}", logging.filter, e))
    })
}

/// Install the global subscriber, writing to stderr.
///
/// Calling this again after a subscriber is installed is a no-op.
pub fn init_logging(logging: &LoggingSection) -> Result<()> {
    let filter = build_filter(logging)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(err) = installed {
        tracing::debug!(error = %err, "subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_ok() {
        let logging = LoggingSection::default();
        init_logging(&logging).unwrap();
        init_logging(&logging).unwrap();
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let logging = LoggingSection {
            filter: "liftlog_core=notalevel".to_string(),
            format: LogFormat::Compact,
        };
        assert!(matches!(
            build_filter(&logging),
            Err(LiftlogError::Config(_))
        ));
    }
}

//! Logging setup for hosts embedding the keystore

use crate::config::LoggingConfig;
use crate::errors::{KeystoreError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global subscriber
///
/// `RUST_LOG` overrides the configured level. Fails if a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| KeystoreError::ConfigError(format!("invalid log level: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        "pretty" => registry.with(fmt::layer()).try_init(),
        other => {
            return Err(KeystoreError::ConfigError(format!(
                "unknown log format {}",
                other
            )))
        }
    };

    result.map_err(|e| KeystoreError::ConfigError(format!("logging already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert!(matches!(
            init_logging(&config),
            Err(KeystoreError::ConfigError(_))
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        // Another test may have won the race; either way a repeat must fail
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}

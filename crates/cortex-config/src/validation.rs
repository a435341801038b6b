//! Configuration validation.
//!
//! Collects every problem in one pass so a misconfigured deployment fails
//! at startup with the full list.

use crate::{AiConfig, AppConfig, DatabaseConfig, EventBusConfig, ObservabilityConfig, RedisConfig, WorkerConfig};
use cortex_core::AiProvider;
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Pool size configuration is invalid (min must be <= max).
    InvalidPoolSize { min: u32, max: u32 },
    /// Pool size exceeds maximum allowed.
    PoolSizeTooLarge { value: u32, maximum: u32 },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Timeout value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Log format is invalid.
    InvalidLogFormat { value: String },
    /// AI provider name is unknown.
    UnknownProvider { field: String, value: String },
    /// Embedding vectors must have at least one component.
    ZeroEmbeddingDimension,
    /// The event bus uses Redis while Redis is disabled.
    RedisDisabled,
    /// The Redis channel pattern is empty.
    EmptyChannelPattern,
    /// The PostgreSQL event bus needs the PostgreSQL database backend.
    PostgresBusWithoutDatabase,
    /// The NOTIFY channel is not a plain SQL identifier.
    InvalidNotifyChannel { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPoolSize { min, max } => {
                write!(f, "Invalid pool size: min ({min}) cannot be greater than max ({max})")
            }
            Self::PoolSizeTooLarge { value, maximum } => {
                write!(f, "Pool size {value} exceeds maximum allowed ({maximum})")
            }
            Self::InvalidUrl { url_type, message } => write!(f, "Invalid {url_type} URL: {message}"),
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{name}' must be positive, got {value}")
            }
            Self::InvalidLogLevel { value } => write!(
                f,
                "Invalid log level: '{value}' (valid: trace, debug, info, warn, error)"
            ),
            Self::InvalidLogFormat { value } => {
                write!(f, "Invalid log format: '{value}' (valid: json, pretty)")
            }
            Self::UnknownProvider { field, value } => {
                write!(f, "Unknown provider for {field}: '{value}'")
            }
            Self::ZeroEmbeddingDimension => write!(f, "Embedding dimension must be positive"),
            Self::RedisDisabled => write!(f, "Redis event bus requires redis.enabled = true"),
            Self::EmptyChannelPattern => write!(f, "Event bus channel pattern cannot be empty"),
            Self::PostgresBusWithoutDatabase => {
                write!(f, "PostgreSQL event bus requires database.backend = postgres")
            }
            Self::InvalidNotifyChannel { value } => write!(
                f,
                "Invalid notify channel: '{value}' (letters, digits and underscores only)"
            ),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: u32 = 1000;
    /// PostgreSQL identifier length limit.
    const MAX_IDENTIFIER_LEN: usize = 63;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];
    /// Valid log formats.
    const VALID_LOG_FORMATS: &'static [&'static str] = &["json", "pretty"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_database(&config.database, &mut errors);
        Self::validate_redis(&config.redis, &config.event_bus, &mut errors);
        Self::validate_event_bus(config, &mut errors);
        Self::validate_worker(&config.worker, &mut errors);
        Self::validate_ai(&config.ai, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_database(config: &DatabaseConfig, errors: &mut Vec<ConfigValidationError>) {
        if !config.backend.needs_pool() {
            return;
        }

        if config.url.is_empty() {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        } else if !config.url.starts_with("postgres://") && !config.url.starts_with("postgresql://") {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL must start with postgres:// or postgresql://".to_string(),
            });
        } else if let Err(e) = Url::parse(&config.url) {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: e.to_string(),
            });
        }

        if config.min_connections > config.max_connections {
            errors.push(ConfigValidationError::InvalidPoolSize {
                min: config.min_connections,
                max: config.max_connections,
            });
        }
        if config.max_connections > Self::MAX_POOL_SIZE {
            errors.push(ConfigValidationError::PoolSizeTooLarge {
                value: config.max_connections,
                maximum: Self::MAX_POOL_SIZE,
            });
        }

        if config.connect_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "database.connect_timeout_secs".to_string(),
                value: 0,
            });
        }
        if config.idle_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "database.idle_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_redis(config: &RedisConfig, event_bus: &EventBusConfig, errors: &mut Vec<ConfigValidationError>) {
        if event_bus.backend.uses_redis() && !config.enabled {
            errors.push(ConfigValidationError::RedisDisabled);
        }
        if !config.enabled {
            return;
        }

        if !config.url.starts_with("redis://") && !config.url.starts_with("rediss://") {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: "URL must start with redis:// or rediss://".to_string(),
            });
        }

        if config.pool_size > Self::MAX_POOL_SIZE {
            errors.push(ConfigValidationError::PoolSizeTooLarge {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }
    }

    fn validate_event_bus(config: &AppConfig, errors: &mut Vec<ConfigValidationError>) {
        let event_bus: &EventBusConfig = &config.event_bus;
        if event_bus.backend.uses_redis() && event_bus.channel_pattern.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyChannelPattern);
        }
        if !event_bus.backend.uses_postgres() {
            return;
        }

        if !config.database.backend.needs_pool() {
            errors.push(ConfigValidationError::PostgresBusWithoutDatabase);
        }
        let channel = &event_bus.notify_channel;
        let plain = channel
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && channel.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !plain || channel.len() > Self::MAX_IDENTIFIER_LEN {
            errors.push(ConfigValidationError::InvalidNotifyChannel { value: channel.clone() });
        }
    }

    fn validate_worker(config: &WorkerConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.heartbeat_interval_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "worker.heartbeat_interval_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_ai(config: &AiConfig, errors: &mut Vec<ConfigValidationError>) {
        for (field, value) in [
            ("ai.provider", &config.provider),
            ("ai.embedding_provider", &config.embedding_provider),
        ] {
            if value.parse::<AiProvider>().is_err() {
                errors.push(ConfigValidationError::UnknownProvider {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }

        if config.embedding_dimension == 0 {
            errors.push(ConfigValidationError::ZeroEmbeddingDimension);
        }
    }

    fn validate_observability(config: &ObservabilityConfig, errors: &mut Vec<ConfigValidationError>) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }

        let format = config.log_format.to_lowercase();
        if !Self::VALID_LOG_FORMATS.contains(&format.as_str()) {
            errors.push(ConfigValidationError::InvalidLogFormat {
                value: config.log_format.clone(),
            });
        }
    }
}

/// Formats validation errors for display.
#[must_use]
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DatabaseBackend, EventBusBackend};

    #[test]
    fn test_default_config_passes() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
        assert!(ConfigValidator::validate(&AppConfig::in_memory()).is_ok());
    }

    #[test]
    fn test_invalid_pool_size() {
        let mut config = AppConfig::default();
        config.database.min_connections = 100;
        config.database.max_connections = 10;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidPoolSize { .. })));
    }

    #[test]
    fn test_memory_backend_skips_database_checks() {
        let mut config = AppConfig::default();
        config.database.backend = DatabaseBackend::Memory;
        config.database.url = String::new();
        config.database.connect_timeout_secs = 0;

        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_non_postgres_url_rejected() {
        let mut config = AppConfig::default();
        config.database.url = "mysql://localhost/cortex".to_string();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigValidationError::InvalidUrl { url_type, .. } if url_type == "database"
        )));
    }

    #[test]
    fn test_redis_bus_requires_redis() {
        let mut config = AppConfig::default();
        config.event_bus.backend = EventBusBackend::Redis;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors, vec![ConfigValidationError::RedisDisabled]);

        config.redis.enabled = true;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_postgres_bus_requires_postgres_database() {
        let mut config = AppConfig::default();
        config.event_bus.backend = EventBusBackend::Postgres;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.database.backend = DatabaseBackend::Memory;
        config.event_bus.notify_channel = "bot-events; DROP".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ConfigValidationError::PostgresBusWithoutDatabase,
                ConfigValidationError::InvalidNotifyChannel {
                    value: "bot-events; DROP".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_zero_heartbeat_interval_rejected() {
        let mut config = AppConfig::in_memory();
        config.worker.heartbeat_interval_secs = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(
            &errors[..],
            [ConfigValidationError::NonPositiveTimeout { name, .. }] if name == "worker.heartbeat_interval_secs"
        ));
    }

    #[test]
    fn test_unknown_provider_and_dimension() {
        let mut config = AppConfig::default();
        config.ai.provider = "claude".to_string();
        config.ai.embedding_dimension = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&ConfigValidationError::ZeroEmbeddingDimension));
    }

    #[test]
    fn test_all_errors_collected() {
        let mut config = AppConfig::default();
        config.observability.log_level = "verbose".to_string();
        config.observability.log_format = "xml".to_string();
        config.database.idle_timeout_secs = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);

        let formatted = format_validation_errors(&errors);
        assert!(formatted.starts_with("Configuration validation failed:"));
        assert!(formatted.contains("3. "));
    }
}

//! Configuration loader with layered sources.

use crate::{format_validation_errors, AppConfig, ConfigValidator};
use config::{Config, ConfigError, Environment, File};
use cortex_core::CortexError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Environment variable selecting the environment overlay file.
pub const ENVIRONMENT_VAR: &str = "CORTEX_ENVIRONMENT";

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
    environment: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Uncommitted local overrides
    /// 4. Environment variables such as `CORTEX_DATABASE__URL`
    ///
    /// The environment comes from `CORTEX_ENVIRONMENT` and defaults to
    /// `development`.
    pub fn new(config_dir: impl Into<String>) -> Result<Self, CortexError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment = std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        Self::with_environment(config_dir, environment)
    }

    /// Creates a loader for an explicit environment.
    pub fn with_environment(config_dir: impl Into<String>, environment: impl Into<String>) -> Result<Self, CortexError> {
        let config_dir = config_dir.into();
        let environment = environment.into();
        let config = Self::load_config(&config_dir, &environment)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
            environment,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, CortexError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    ///
    /// The previous configuration stays in place if the new one is invalid.
    pub async fn reload(&self) -> Result<(), CortexError> {
        let new_config = Self::load_config(&self.config_dir, &self.environment)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Gets a specific configuration value by key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }

    fn load_config(config_dir: &str, environment: &str) -> Result<AppConfig, CortexError> {
        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment, "local"] {
            let path = format!("{config_dir}/{name}.toml");
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CORTEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(config_error_to_cortex_error)?;

        ConfigValidator::validate(&app_config).map_err(|errors| {
            let message = format_validation_errors(&errors);
            error!("{}", message);
            CortexError::Configuration(message)
        })?;

        Ok(app_config)
    }
}

fn config_error_to_cortex_error(err: ConfigError) -> CortexError {
    CortexError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseBackend;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_environment(dir.path().join("absent").to_string_lossy(), "test").unwrap();

        let config = loader.get().await;
        assert_eq!(config.app.name, "cortex");
        assert_eq!(config.ai.embedding_dimension, 768);
    }

    #[tokio::test]
    async fn test_layers_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "default.toml",
            "[database]\nbackend = \"memory\"\nmax_connections = 4\n[ai]\nmock_reply = \"default\"\n",
        );
        write(dir.path(), "staging.toml", "[ai]\nmock_reply = \"staging\"\n");
        write(dir.path(), "local.toml", "[database]\nmax_connections = 8\n");

        let loader = ConfigLoader::with_environment(dir.path().to_string_lossy(), "staging").unwrap();
        let config = loader.get().await;

        assert_eq!(config.database.backend, DatabaseBackend::Memory);
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.ai.mock_reply, "staging");
    }

    #[tokio::test]
    async fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default.toml", "[observability]\nlog_level = \"loud\"\n");

        let err = ConfigLoader::with_environment(dir.path().to_string_lossy(), "test").err().unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default.toml", "[ai]\nembedding_dimension = 3\n");

        let loader = ConfigLoader::with_environment(dir.path().to_string_lossy(), "test").unwrap();
        assert_eq!(loader.get_value::<usize>("ai.embedding_dimension").await, Some(3));

        write(dir.path(), "default.toml", "[ai]\nembedding_dimension = 5\n");
        loader.reload().await.unwrap();
        assert_eq!(loader.get_value::<usize>("ai.embedding_dimension").await, Some(5));
        assert_eq!(loader.get_value::<usize>("ai.missing").await, None);
    }
}

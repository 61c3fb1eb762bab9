//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in this order, later ones
//! winning:
//!
//! 1. the base YAML file
//! 2. `environments/<environment>.yaml` next to it, when present
//! 3. environment variables such as `MIGRATOR__RETRY__MAX_ATTEMPTS=8`

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::MigratorConfig;
use crate::constants;

/// Loaded, validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: MigratorConfig,
    environment: String,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load configuration with the environment taken from `MIGRATOR_ENV`
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let environment = Self::detect_environment();
        Self::load_from_path(path, &environment)
    }

    /// Load configuration for an explicit environment
    pub fn load_from_path(path: impl AsRef<Path>, environment: &str) -> ConfigResult<Self> {
        Self::load_with_env_prefix(path, environment, constants::env::CONFIG_PREFIX)
    }

    /// Load configuration reading overrides from variables under `prefix`.
    ///
    /// Useful for testing without touching the variables a real deployment would read.
    pub fn load_with_env_prefix(
        path: impl AsRef<Path>,
        environment: &str,
        prefix: &str,
    ) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::config_file_not_found(path));
        }

        let override_path = Self::environment_override_path(path, environment);
        debug!(
            environment = %environment,
            config_path = %path.display(),
            override_path = %override_path.display(),
            "Loading migrator configuration"
        );

        let settings = Config::builder()
            .add_source(File::from(path.to_path_buf()).format(FileFormat::Yaml))
            .add_source(
                File::from(override_path)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator(constants::env::CONFIG_SEPARATOR)
                    .separator(constants::env::CONFIG_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        let config: MigratorConfig = settings
            .try_deserialize()
            .map_err(ConfigurationError::deserialize_error)?;

        config.validate()?;

        info!(
            environment = %environment,
            max_attempts = config.retry.max_attempts,
            initial_delay_ms = config.retry.initial_delay_ms,
            max_delay_ms = config.retry.max_delay_ms,
            cache_enabled = config.reconciler.cache_enabled,
            "Configuration loaded successfully"
        );

        Ok(Self {
            config,
            environment: environment.to_string(),
            config_path: path.to_path_buf(),
        })
    }

    /// Wrap an already-built configuration, validating it
    pub fn from_config(config: MigratorConfig, environment: &str) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            environment: environment.to_string(),
            config_path: PathBuf::new(),
        })
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn into_config(self) -> MigratorConfig {
        self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current environment from `MIGRATOR_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var(constants::env::ENVIRONMENT)
            .unwrap_or_else(|_| constants::env::DEFAULT_ENVIRONMENT.to_string())
    }

    fn environment_override_path(base: &Path, environment: &str) -> PathBuf {
        base.parent()
            .unwrap_or_else(|| Path::new("."))
            .join("environments")
            .join(format!("{environment}.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_path_sits_next_to_base() {
        let path = ConfigManager::environment_override_path(
            Path::new("/etc/migrator/migrator.yaml"),
            "production",
        );
        assert_eq!(
            path,
            PathBuf::from("/etc/migrator/environments/production.yaml")
        );
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = ConfigManager::load_from_path("/definitely/not/here.yaml", "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = MigratorConfig::default();
        config.retry.max_attempts = 0;
        assert!(ConfigManager::from_config(config, "test").is_err());
    }
}

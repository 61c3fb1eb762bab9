//! # Migrator Configuration
//!
//! Tuning parameters for the retry layer, the reconciler, hierarchy repair and logging.
//!
//! The eventual-consistency window of the destination platform is observed rather than
//! guaranteed, so attempt counts, delays and the consistency window are all configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use project_migrator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_path("config/migrator.yaml", "test")?;
//! let policy = manager.config().retry.to_policy();
//! assert!(policy.max_attempts >= 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;
use crate::hierarchy::OrphanPolicy;
use crate::resilience::RetryPolicy;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/migrator.yaml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Retry and backoff settings for every remote call
    pub retry: RetryConfig,

    /// Resource reconciliation settings
    pub reconciler: ReconcilerConfig,

    /// Hierarchy repair settings
    pub hierarchy: HierarchyConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

/// Retry and backoff configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per remote call, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Growth factor applied per retry
    pub backoff_multiplier: f64,
    /// Ceiling for any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::retry::DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: constants::retry::DEFAULT_INITIAL_DELAY_MS,
            backoff_multiplier: constants::retry::DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: constants::retry::DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Settings for test/CI runs, where remote lag is longer and flakier
    pub fn ci() -> Self {
        Self {
            max_attempts: constants::retry::CI_MAX_ATTEMPTS,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay(),
            multiplier: self.backoff_multiplier,
            max_delay: self.max_delay(),
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Cache resolved handles for the lifetime of one orchestrator
    pub cache_enabled: bool,
    /// Window after a create in which a 404 on that container counts as replication lag
    pub consistency_window_ms: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            consistency_window_ms: constants::reconciler::DEFAULT_CONSISTENCY_WINDOW_MS,
        }
    }
}

impl ReconcilerConfig {
    pub fn consistency_window(&self) -> Duration {
        Duration::from_millis(self.consistency_window_ms)
    }
}

/// Hierarchy repair configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub orphan_policy: OrphanPolicy,
}

/// Log output configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to `RUST_LOG` and then the environment default
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl MigratorConfig {
    /// Defaults with the CI retry profile
    pub fn for_ci() -> Self {
        Self {
            retry: RetryConfig::ci(),
            ..Self::default()
        }
    }

    /// Reject settings that would make retry behaviour meaningless
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }

        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier.to_string(),
                "multiplier must be >= 1.0",
            ));
        }

        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.initial_delay_ms",
                self.retry.initial_delay_ms.to_string(),
                format!(
                    "initial delay exceeds max_delay_ms ({})",
                    self.retry.max_delay_ms
                ),
            ));
        }

        Ok(())
    }
}

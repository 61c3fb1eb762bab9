//! # System Constants
//!
//! Defaults and fixed vocabularies shared by the retry layer, the reconciler and the
//! configuration loader.

/// Retry schedule defaults
pub mod retry {
    /// Attempts per remote call, including the first one
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    /// Attempts per remote call in test/CI environments
    pub const CI_MAX_ATTEMPTS: u32 = 10;
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
}

/// Reconciler defaults
pub mod reconciler {
    /// How long after a create a 404 on the same container is treated as lag
    pub const DEFAULT_CONSISTENCY_WINDOW_MS: u64 = 60_000;
}

/// HTTP status groups used by error classification
pub mod status {
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const TOO_MANY_REQUESTS: u16 = 429;

    pub fn is_server_error(status: u16) -> bool {
        (500..600).contains(&status)
    }
}

/// Environment variable names
pub mod env {
    pub const ENVIRONMENT: &str = "MIGRATOR_ENV";
    pub const LOG_FORMAT: &str = "MIGRATOR_LOG_FORMAT";
    /// Prefix for configuration overrides, e.g. `MIGRATOR__RETRY__MAX_ATTEMPTS=8`
    pub const CONFIG_PREFIX: &str = "MIGRATOR";
    pub const CONFIG_SEPARATOR: &str = "__";
    pub const DEFAULT_ENVIRONMENT: &str = "development";
}

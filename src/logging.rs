//! # Structured Logging Module
//!
//! Environment-aware console logging on the tracing ecosystem, plus domain helpers that keep
//! field names consistent across the retry layer, the reconciler and the hierarchy builder.

use std::io::IsTerminal;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::constants;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging from environment variables
pub fn init_structured_logging() {
    init_structured_logging_with(&LoggingConfig::default());
}

/// Initialize structured logging with explicit settings.
///
/// Only the first call has any effect. An already-installed global subscriber is left in place.
pub fn init_structured_logging_with(settings: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = build_filter(settings, &environment);
        let json = settings.json || json_requested();

        let layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - keeping existing one");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

fn build_filter(settings: &LoggingConfig, environment: &str) -> EnvFilter {
    if let Some(level) = &settings.level {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(get_log_level(environment)))
}

fn json_requested() -> bool {
    std::env::var(constants::env::LOG_FORMAT)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(constants::env::ENVIRONMENT)
        .unwrap_or_else(|_| constants::env::DEFAULT_ENVIRONMENT.to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log one attempt of a remote call
pub fn log_remote_operation(
    operation: &str,
    attempt: u32,
    status: &str,
    category: Option<&str>,
    delay_ms: Option<u64>,
) {
    tracing::debug!(
        operation = %operation,
        attempt = attempt,
        status = %status,
        category = category,
        delay_ms = delay_ms,
        timestamp = %Utc::now().to_rfc3339(),
        "REMOTE_OPERATION"
    );
}

/// Log a create-vs-reuse decision for a named resource
pub fn log_reconcile_operation(resource_kind: &str, resource: &str, scope: &str, outcome: &str) {
    tracing::info!(
        resource_kind = %resource_kind,
        resource = %resource,
        scope = %scope,
        outcome = %outcome,
        "RECONCILE_OPERATION"
    );
}

/// Log a hierarchy repair
pub fn log_structural_warning(external_id: &str, reported_depth: u32, resolved_depth: u32, reason: &str) {
    tracing::warn!(
        external_id = %external_id,
        reported_depth = reported_depth,
        resolved_depth = resolved_depth,
        reason = %reason,
        "STRUCTURAL_REPAIR"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

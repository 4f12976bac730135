//! Tracing/logging initialization and request spans.

use tracing_subscriber::EnvFilter;

use crate::LogConfig;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    // JSON logs + timestamps in deployments; human-readable locally.
    let _ = if config.json {
        builder.json().with_target(true).try_init()
    } else {
        builder.with_target(true).try_init()
    };
}

/// Span wrapping one inbound request. `tenant_id` and `user_id` are recorded
/// later, once resolution and authentication have run.
pub fn request_span(correlation_id: &str, method: &str, path: &str) -> tracing::Span {
    tracing::info_span!(
        "http.request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        tenant_id = tracing::field::Empty,
        user_id = tracing::field::Empty,
    )
}

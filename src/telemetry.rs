use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging.
///
/// Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
/// directives are honoured on top of the configured level.
pub fn init_telemetry(observability: &ObservabilityConfig) -> Result<()> {
    let level: tracing::Level = observability
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let json_layer = observability.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
    });
    let plain_layer = (!observability.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(json_layer)
        .with(plain_layer)
        .with(filter)
        .try_init()?;

    tracing::debug!("Camp tracker telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common stage tracking attributes
pub fn create_stage_span(
    operation: &str,
    event_id: Option<&str>,
    beneficiary_id: Option<&str>,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "stage_tracking",
        operation = operation,
        event.id = event_id,
        beneficiary.id = beneficiary_id,
        correlation.id = correlation_id,
    )
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    // For structured logging, no explicit shutdown needed
    tracing::debug!("Camp tracker telemetry shutdown complete");
}

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_COMPILE_TOTAL: &str = "markview_compile_total";
pub const METRIC_COMPILE_MS: &str = "markview_compile_ms";
pub const METRIC_MESSAGE_DROPPED_TOTAL: &str = "markview_message_dropped_total";
pub const METRIC_STALE_RESULT_TOTAL: &str = "markview_stale_result_total";
pub const METRIC_RENDERER_REMOUNT_TOTAL: &str = "markview_renderer_remount_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_COMPILE_TOTAL,
            Unit::Count,
            "Total number of document compilations, labelled by outcome."
        );
        describe_histogram!(
            METRIC_COMPILE_MS,
            Unit::Milliseconds,
            "Document compilation latency in milliseconds."
        );
        describe_counter!(
            METRIC_MESSAGE_DROPPED_TOTAL,
            Unit::Count,
            "Renderer messages dropped because they failed to decode or were stale."
        );
        describe_counter!(
            METRIC_STALE_RESULT_TOTAL,
            Unit::Count,
            "Compile results discarded because a newer request superseded them."
        );
        describe_counter!(
            METRIC_RENDERER_REMOUNT_TOTAL,
            Unit::Count,
            "Renderer instances discarded and recreated."
        );
    });
}

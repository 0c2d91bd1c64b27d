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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "calcengine_cache_hit_total",
            Unit::Count,
            "Total number of result-cache hits."
        );
        describe_counter!(
            "calcengine_cache_miss_total",
            Unit::Count,
            "Total number of result-cache misses."
        );
        describe_counter!(
            "calcengine_cache_evict_total",
            Unit::Count,
            "Total number of cache evictions due to capacity."
        );
        describe_counter!(
            "calcengine_cache_expired_total",
            Unit::Count,
            "Total number of cache entries dropped by TTL expiry."
        );
        describe_counter!(
            "calcengine_validation_reject_total",
            Unit::Count,
            "Total number of calculations rejected by input validation."
        );
        describe_counter!(
            "calcengine_flight_coalesced_total",
            Unit::Count,
            "Total number of calls coalesced onto an in-flight calculation."
        );
        describe_histogram!(
            "calcengine_compute_ms",
            Unit::Milliseconds,
            "Algorithm dispatch latency in milliseconds."
        );
    });
}

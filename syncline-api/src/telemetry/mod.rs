//! Syncline Telemetry - Observability Infrastructure
//!
//! Provides tracing initialization and Prometheus metrics for the API layer.
//! All features work standalone without external collectors.

pub mod metrics;
pub mod middleware;

pub use metrics::{metrics_handler, SynclineMetrics, METRICS};
pub use middleware::observability_middleware;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` controls the filter (default `info`); setting
/// `SYNCLINE_LOG_FORMAT=json` switches to newline-delimited JSON output for
/// log shippers.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_output = std::env::var("SYNCLINE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

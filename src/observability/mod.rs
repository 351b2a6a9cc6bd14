//! Observability for the access layer
//!
//! - Structured logging through `tracing`
//! - Monotonic counters for the batching cache
//!
//! Library code only emits events; installing a subscriber is left to the
//! binary (see [`init_logging`]).

mod metrics;

pub use metrics::{MetricsRegistry, MetricsSnapshot};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Installing twice is a
/// no-op.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

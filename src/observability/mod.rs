//! Logging and metrics setup.
//!
//! Metrics are recorded through the `metrics` facade; without an installed
//! recorder they are no-ops, so embedding hosts choose the exporter.

pub mod metrics;

use tracing_subscriber::EnvFilter;

use crate::constants::logging;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `level`; `json` switches to JSON lines output.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("substation_auction={level}")))
        .unwrap_or_else(|_| EnvFilter::new(logging::DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // try_init so tests and embedding hosts can call this more than once
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

//! Console telemetry for the server binary.
//!
//! Subscribes to standard tracing logs printed to the console via
//! `tracing_subscriber::fmt`, filtered through `RUST_LOG` with an `info`
//! default. Spans and events from the pipeline - including the
//! logged-but-swallowed cleanup failures - all land here.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber.
pub fn init_telemetry() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_file(true)
                .pretty(),
        )
        .init();
}

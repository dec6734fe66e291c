use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. Calling this twice is a no-op.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Log a completed backend call at DEBUG level.
pub(crate) fn backend_call(method: &str, path: &str, status: Option<u16>, started: Instant) {
    let duration = started.elapsed();

    match status {
        Some(status) => tracing::debug!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Backend request"
        ),
        None => tracing::debug!(
            method = %method,
            path = %path,
            duration_ms = %duration.as_millis(),
            "Backend request failed before a response"
        ),
    }
}

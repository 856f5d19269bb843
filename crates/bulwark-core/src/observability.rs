//! Logging initialization and span helpers.
//!
//! Planning and reading both log through `tracing`; binaries embedding the
//! engine call [`init_logging`] once at startup.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `bulwark_split=debug`)
///
/// # Example
///
/// ```rust
/// use bulwark_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .try_init();
            }
        }
    });
}

/// Creates a span covering one planning pass.
///
/// ```rust
/// use bulwark_core::observability::planning_span;
///
/// let span = planning_span(3);
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn planning_span(request_count: usize) -> Span {
    tracing::info_span!("split_planning", requests = request_count)
}

/// Creates a span covering one reader's lifetime over a split.
#[must_use]
pub fn reader_span(split_id: &str, resource_count: usize) -> Span {
    tracing::info_span!(
        "split_reader",
        split_id = split_id,
        resources = resource_count,
    )
}

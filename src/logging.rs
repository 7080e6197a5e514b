//! Diagnostic tracing for the supervisor itself.
//!
//! - **Tracing (this module)**: supervisor diagnostics via `RUST_LOG`, written
//!   to stderr. Not part of the command's reported output.
//! - **Sinks (`sinks`)**: the product output (lifecycle lines, capture files,
//!   telemetry records). Unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn";

/// Installs the global tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to [`DEFAULT_FILTER`]. Output: stderr, compact.
/// Calling it twice is harmless; the second call is ignored.
///
/// # Example
/// ```bash
/// RUST_LOG=jobvisor=debug jobvisor --attempts 3 -- ./backup.sh
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

//! Development-time tracing for debugging the runner.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Covers spawn, wait, and termination internals. Not part of the run's
//!   product output.
//!
//! - **Diagnostic sink (`io/diag`)**: Messages the harness asked for, written
//!   whole to the caller's sink. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format. A subscriber installed earlier by an
/// embedding harness is left in place.
///
/// # Example
/// ```bash
/// RUST_LOG=runner=debug runner exec --timeout 5 -- ./test.exe
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

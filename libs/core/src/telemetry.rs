//! Telemetry module providing tracing subscriber initialization for binaries.
//!
//! Benchmark binaries keep stdout for results (summary tables, and for
//! candidate programs the final JSON result line), so every subscriber
//! here writes to stderr.
//!
//! # Usage
//!
//! ```no_run
//! use vecbench_core::telemetry;
//!
//! fn main() {
//!     telemetry::init_dev_subscriber_with_env_filter();
//!     tracing::info!("Application started");
//! }
//! ```

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize a simple stderr subscriber at a fixed level.
///
/// Call this at application startup (not in the library). Returns quietly
/// if a global subscriber has already been installed (e.g. by a test
/// harness).
pub fn init_dev_subscriber(level: Level) {
    let subscriber = fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already set");
    }
}

/// Initialize a stderr subscriber that honors `RUST_LOG`.
///
/// If `RUST_LOG` is not set, defaults to [`DEFAULT_FILTER`].
///
/// ```no_run
/// // RUST_LOG=vecbench=debug,info shows captured candidate stderr
/// vecbench_core::telemetry::init_dev_subscriber_with_env_filter();
/// ```
pub fn init_dev_subscriber_with_env_filter() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already set");
    }
}

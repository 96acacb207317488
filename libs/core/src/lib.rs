//! Shared building blocks for the vecbench crates.
//!
//! - [`distance`] - scalar distance kernels used by exact search
//! - [`telemetry`] - tracing subscriber initialization for binaries

pub mod distance;
pub mod telemetry;

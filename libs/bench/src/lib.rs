//! Ground-truth and benchmark-protocol engine for comparing approximate
//! nearest-neighbor search implementations.
//!
//! The crate prepares labeled datasets (fvecs/ivecs codec plus brute-force
//! exact neighbors), runs each candidate engine as an external process
//! under a timeout, and reduces repeated runs into comparable reports.
//!
//! ```text
//! DatasetCache::prepare ──► Dataset ──► Orchestrator::run_suite ──► SuiteReport
//!        │                                   │                          │
//!   codec + ground_truth            Candidate processes          aggregate → ResultStore
//! ```

pub mod aggregate;
pub mod candidate;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ground_truth;
pub mod orchestrator;
pub mod report;
pub mod result;
pub mod store;
pub mod vectors;

pub use aggregate::{aggregate, AggregatedResult, MetricStats};
pub use candidate::{Candidate, CandidateOptions};
pub use config::{BenchConfig, IndexParams};
pub use dataset::{Dataset, DatasetCache, DatasetCatalog, DatasetHandle, DatasetSpec};
pub use error::{BenchError, Result};
pub use ground_truth::Metric;
pub use orchestrator::{Orchestrator, SuiteReport};
pub use result::BenchmarkResult;
pub use store::ResultStore;
pub use vectors::{NeighborList, VectorSet};

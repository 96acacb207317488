//! Benchmark configuration.
//!
//! Defaults match the usual HNSW comparison setup (M=16, ef_construction=200,
//! ef_search=100, k=10). A JSON file may override any subset of fields;
//! command-line flags are applied on top with the `with_*` builders.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateOptions;
use crate::error::{BenchError, Result};

/// Index parameters passed through to every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    /// Max neighbors per node.
    #[serde(rename = "M")]
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Neighbors returned per query; also the ground-truth depth.
    pub k: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            k: 10,
        }
    }
}

/// Top-level benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Dataset cache root, exported to candidates as `VECBENCH_DATA_DIR`.
    pub data_dir: PathBuf,
    /// Where `<dataset>.json` reports are written.
    pub results_dir: PathBuf,
    /// Working directory for candidate processes.
    pub project_dir: PathBuf,
    /// Per-invocation wall-clock limit.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Sequential invocations per candidate.
    pub runs: usize,
    pub params: IndexParams,
    /// Insert threads (proximum).
    pub threads: usize,
    /// JVM warmup rounds before measurement (proximum).
    pub warmup: usize,
    /// Interpreter for the hnswlib script. Defaults to the project venv,
    /// then `python3`.
    pub python: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            results_dir: PathBuf::from("./results"),
            project_dir: PathBuf::from("."),
            timeout: Duration::from_secs(3600),
            runs: 1,
            params: IndexParams::default(),
            threads: 8,
            warmup: 1,
            python: None,
        }
    }
}

impl BenchConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_params(mut self, params: IndexParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = Some(python.into());
        self
    }

    /// Reject configurations no candidate could run.
    pub fn validate(&self) -> Result<()> {
        if self.runs == 0 {
            return Err(BenchError::config("runs must be at least 1"));
        }
        if self.params.k == 0 {
            return Err(BenchError::config("k must be at least 1"));
        }
        if self.params.m == 0 {
            return Err(BenchError::config("M must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(BenchError::config("timeout must be positive"));
        }
        if self.params.ef_search < self.params.k {
            return Err(BenchError::config(format!(
                "ef_search ({}) must be >= k ({})",
                self.params.ef_search, self.params.k
            )));
        }
        Ok(())
    }

    pub fn candidate_options(&self) -> CandidateOptions {
        CandidateOptions {
            threads: self.threads,
            warmup: self.warmup,
            python: self.python.clone(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

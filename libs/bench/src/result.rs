//! Candidate result records.
//!
//! A candidate reports one flat JSON object. It is kept as an open
//! name-to-value map so extra candidate fields (storage size, heap usage,
//! engine-specific counters) survive into the saved report; numeric fields
//! are read through [`BenchmarkResult::metric`], where absence is `None`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields every candidate result must carry.
pub const REQUIRED_FIELDS: &[&str] = &[
    "library",
    "dataset",
    "n_vectors",
    "n_queries",
    "dim",
    "M",
    "ef_construction",
    "ef_search",
    "k",
    "insert_throughput",
    "search_latency_mean_us",
    "search_latency_p50_us",
    "search_latency_p99_us",
    "search_qps",
    "recall_at_k",
];

/// Fields that identify a run configuration; they must agree across
/// repeated runs of the same candidate.
pub const IDENTITY_FIELDS: &[&str] = &["library", "dataset", "M", "ef_construction", "ef_search", "k"];

/// One benchmark result, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkResult {
    fields: Map<String, Value>,
}

impl BenchmarkResult {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Parse a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Required fields absent from this result.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !self.fields.contains_key(*f))
            .collect()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Numeric field as `f64`, `None` when absent or not a number.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn library(&self) -> &str {
        self.str_field("library").unwrap_or("unknown")
    }

    pub fn dataset(&self) -> &str {
        self.str_field("dataset").unwrap_or("unknown")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<BenchmarkResult> for Value {
    fn from(result: BenchmarkResult) -> Self {
        Value::Object(result.fields)
    }
}

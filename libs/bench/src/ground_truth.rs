//! Brute-force exact nearest neighbors, the accuracy oracle for recall.
//!
//! Every query is scored against every base vector; no approximate index is
//! involved. Ranking is a total order on `(score, index)`:
//!
//! - `l2`: ascending squared Euclidean distance.
//! - `angular`: base and query vectors are L2-normalized, then ranked by
//!   descending dot product.
//!
//! Equal scores prefer the lower base index, so output is reproducible
//! bit-for-bit across runs and between [`compute`] and [`compute_parallel`].
//!
//! Under `angular`, a zero vector has no direction and is treated as
//! maximally dissimilar: zero base vectors rank after every non-zero one, and
//! a zero query sees all base vectors as equally far, which yields the first
//! `k` indices. NaN scores rank last.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vecbench_core::distance::{dot, euclidean_squared, normalize};

use crate::error::{BenchError, Result};
use crate::vectors::{NeighborList, VectorSet};

/// Similarity metric used for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    L2,
    #[serde(alias = "cosine")]
    Angular,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::Angular => "angular",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Metric::L2),
            "angular" | "cosine" => Ok(Metric::Angular),
            other => Err(BenchError::config(format!(
                "unknown metric '{other}' (expected l2 or angular)"
            ))),
        }
    }
}

/// Base vectors in the form the scorer needs.
struct PreparedBase<'a> {
    vectors: std::borrow::Cow<'a, VectorSet>,
    /// Rows that have a direction (always true under l2).
    valid: Vec<bool>,
    metric: Metric,
}

impl<'a> PreparedBase<'a> {
    fn new(base: &'a VectorSet, metric: Metric) -> Self {
        match metric {
            Metric::L2 => Self {
                vectors: std::borrow::Cow::Borrowed(base),
                valid: vec![true; base.len()],
                metric,
            },
            Metric::Angular => {
                let mut valid = Vec::with_capacity(base.len());
                let normalized = base.map_rows(|row| match normalize(row) {
                    Some(unit) => {
                        valid.push(true);
                        unit
                    }
                    None => {
                        valid.push(false);
                        vec![0.0; row.len()]
                    }
                });
                Self {
                    vectors: std::borrow::Cow::Owned(normalized),
                    valid,
                    metric,
                }
            }
        }
    }

    /// Top-k base indices for one query. Lower key ranks first.
    fn rank(&self, query: &[f32], k: usize) -> Vec<u32> {
        let unit_query = match self.metric {
            Metric::L2 => None,
            Metric::Angular => normalize(query),
        };

        let mut scored: Vec<(f32, u32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let key = match self.metric {
                    Metric::L2 => euclidean_squared(query, row),
                    Metric::Angular => match &unit_query {
                        Some(q) if self.valid[i] => -dot(q, row),
                        _ => f32::INFINITY,
                    },
                };
                (rank_key(key), i as u32)
            })
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k, compare);
            scored.truncate(k);
        }
        scored.sort_unstable_by(compare);
        scored.into_iter().map(|(_, i)| i).collect()
    }
}

/// Map a raw score onto a totally ordered key: NaN sorts last and -0.0
/// compares equal to 0.0.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::INFINITY
    } else {
        score + 0.0
    }
}

fn compare(a: &(f32, u32), b: &(f32, u32)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

fn check_inputs(base: &VectorSet, queries: &VectorSet, k: usize) -> Result<()> {
    if k == 0 {
        return Err(BenchError::config("k must be at least 1"));
    }
    if base.is_empty() {
        return Err(BenchError::config("base set is empty"));
    }
    if !queries.is_empty() && base.dim() != queries.dim() {
        return Err(BenchError::format(format!(
            "dimension mismatch: base has {}, queries have {}",
            base.dim(),
            queries.dim()
        )));
    }
    Ok(())
}

/// Exact top-`k` base indices for every query, computed sequentially.
///
/// Each output row has `min(k, n_base)` entries.
pub fn compute(
    base: &VectorSet,
    queries: &VectorSet,
    k: usize,
    metric: Metric,
) -> Result<NeighborList> {
    check_inputs(base, queries, k)?;
    debug!(
        n_base = base.len(),
        n_queries = queries.len(),
        k,
        %metric,
        "Computing brute-force ground truth"
    );

    let prepared = PreparedBase::new(base, metric);
    let mut results = Vec::with_capacity(queries.len());
    for (qi, query) in queries.iter().enumerate() {
        results.push(prepared.rank(query, k));
        if (qi + 1) % 1000 == 0 {
            debug!(done = qi + 1, total = queries.len(), "Ground truth progress");
        }
    }
    Ok(results)
}

/// Same as [`compute`], with queries spread over the rayon pool.
///
/// Workers share read-only base and query data and each fills its own
/// output row.
pub fn compute_parallel(
    base: &VectorSet,
    queries: &VectorSet,
    k: usize,
    metric: Metric,
) -> Result<NeighborList> {
    check_inputs(base, queries, k)?;
    debug!(
        n_base = base.len(),
        n_queries = queries.len(),
        k,
        %metric,
        threads = rayon::current_num_threads(),
        "Computing brute-force ground truth in parallel"
    );

    let prepared = PreparedBase::new(base, metric);
    let query_rows: Vec<&[f32]> = queries.iter().collect();
    Ok(query_rows
        .par_iter()
        .map(|query| prepared.rank(query, k))
        .collect())
}

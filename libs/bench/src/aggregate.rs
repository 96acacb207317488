//! Multi-run aggregation: mean, sample standard deviation and raw samples
//! per tracked metric.

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::result::{BenchmarkResult, IDENTITY_FIELDS};

/// Metrics reduced across runs. Other fields are copied from the first run.
pub const TRACKED_METRICS: &[&str] = &[
    "insert_throughput",
    "search_qps",
    "search_latency_mean_us",
    "search_latency_p50_us",
    "search_latency_p99_us",
    "recall_at_k",
    "insert_time_sec",
    "total_storage_mb",
    "heap_mb",
];

/// Summary of one metric over the runs that reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricStats {
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator); 0 for a single sample.
    pub stddev: f64,
    /// Raw values in invocation order.
    pub samples: Vec<f64>,
}

impl MetricStats {
    /// `None` for an empty sample list.
    pub fn from_samples(samples: Vec<f64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let stddev = if samples.len() > 1 {
            let ss: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Some(Self {
            mean,
            stddev,
            samples,
        })
    }
}

/// Results of repeated runs of one candidate, reduced to one record.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    first: BenchmarkResult,
    stats: Vec<(&'static str, MetricStats)>,
    n_runs: usize,
}

impl AggregatedResult {
    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    pub fn library(&self) -> &str {
        self.first.library()
    }

    /// Aggregated mean when available, otherwise the first run's value.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.stats(name)
            .map(|s| s.mean)
            .or_else(|| self.first.metric(name))
    }

    pub fn stats(&self, name: &str) -> Option<&MetricStats> {
        self.stats.iter().find(|(m, _)| *m == name).map(|(_, s)| s)
    }

    /// The flat JSON record written to reports.
    ///
    /// For a single run this is the run itself. Otherwise each tracked
    /// metric holds its mean, with `<metric>_stddev`, `<metric>_runs` and
    /// `n_runs` added.
    pub fn to_result(&self) -> BenchmarkResult {
        if self.n_runs == 1 {
            return self.first.clone();
        }
        let mut fields = self.first.fields().clone();
        for (metric, stats) in &self.stats {
            fields.insert(metric.to_string(), Value::from(stats.mean));
            fields.insert(format!("{metric}_stddev"), Value::from(stats.stddev));
            fields.insert(format!("{metric}_runs"), Value::from(stats.samples.clone()));
        }
        fields.insert("n_runs".to_string(), Value::from(self.n_runs));
        BenchmarkResult::from_map(fields)
    }
}

impl Serialize for AggregatedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_result().serialize(serializer)
    }
}

/// Reduce repeated runs of one candidate.
///
/// Returns `None` for no runs and the run unchanged for one. Identity
/// fields are taken from the first run; disagreement is logged, not
/// rejected.
pub fn aggregate(results: &[BenchmarkResult]) -> Option<AggregatedResult> {
    let (first, rest) = results.split_first()?;
    if rest.is_empty() {
        return Some(AggregatedResult {
            first: first.clone(),
            stats: Vec::new(),
            n_runs: 1,
        });
    }

    for (i, run) in rest.iter().enumerate() {
        for field in IDENTITY_FIELDS {
            if run.get(field) != first.get(field) {
                warn!(
                    field,
                    run = i + 2,
                    expected = ?first.get(field),
                    found = ?run.get(field),
                    "Identity field differs across runs; keeping first run's value"
                );
            }
        }
    }

    let stats = TRACKED_METRICS
        .iter()
        .filter_map(|&metric| {
            let samples: Vec<f64> = results.iter().filter_map(|r| r.metric(metric)).collect();
            MetricStats::from_samples(samples).map(|s| (metric, s))
        })
        .collect();

    Some(AggregatedResult {
        first: first.clone(),
        stats,
        n_runs: results.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(qps: f64) -> BenchmarkResult {
        BenchmarkResult::from_value(json!({
            "library": "hnswlib",
            "dataset": "sift10k",
            "M": 16,
            "ef_construction": 200,
            "ef_search": 100,
            "k": 10,
            "search_qps": qps,
            "recall_at_k": 0.99,
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_is_none() {
        assert!(aggregate(&[]).is_none());
    }

    #[test]
    fn test_single_run_is_identity() {
        let only = run(1500.0);
        let agg = aggregate(std::slice::from_ref(&only)).unwrap();
        assert_eq!(agg.n_runs(), 1);
        assert_eq!(agg.to_result(), only);
        assert!(agg.to_result().get("n_runs").is_none());
        assert!(agg.to_result().get("search_qps_stddev").is_none());
    }

    #[test]
    fn test_mean_and_sample_stddev() {
        let agg = aggregate(&[run(100.0), run(200.0), run(300.0)]).unwrap();
        let qps = agg.stats("search_qps").unwrap();
        assert!((qps.mean - 200.0).abs() < 1e-9);
        assert!((qps.stddev - 100.0).abs() < 1e-9);
        assert_eq!(qps.samples, vec![100.0, 200.0, 300.0]);
        assert_eq!(agg.n_runs(), 3);

        let out = agg.to_result();
        assert_eq!(out.metric("search_qps"), Some(200.0));
        assert_eq!(out.metric("search_qps_stddev"), Some(100.0));
        assert_eq!(out.get("search_qps_runs"), Some(&json!([100.0, 200.0, 300.0])));
        assert_eq!(out.metric("n_runs"), Some(3.0));
        assert_eq!(out.library(), "hnswlib");
    }

    #[test]
    fn test_metric_in_one_sample_has_zero_stddev() {
        let mut with_heap = run(100.0).into_map();
        with_heap.insert("heap_mb".into(), json!(512.0));
        let agg = aggregate(&[run(100.0), BenchmarkResult::from_map(with_heap)]).unwrap();

        let heap = agg.stats("heap_mb").unwrap();
        assert_eq!(heap.samples, vec![512.0]);
        assert_eq!(heap.stddev, 0.0);
        // absent everywhere: no stats and no error
        assert!(agg.stats("total_storage_mb").is_none());
        assert!(agg.to_result().get("total_storage_mb_stddev").is_none());
    }

    #[test]
    fn test_identity_mismatch_keeps_first() {
        let mut other = run(300.0).into_map();
        other.insert("M".into(), json!(32));
        let agg = aggregate(&[run(100.0), BenchmarkResult::from_map(other)]).unwrap();
        assert_eq!(agg.to_result().metric("M"), Some(16.0));
        assert_eq!(agg.metric("search_qps"), Some(200.0));
    }

    #[test]
    fn test_serializes_as_flat_record() {
        let agg = aggregate(&[run(10.0), run(20.0)]).unwrap();
        let value = serde_json::to_value(&agg).unwrap();
        assert_eq!(value["n_runs"], json!(2));
        assert_eq!(value["search_qps"], json!(15.0));
    }
}

//! Plain-text summaries of suite results.

use std::fmt::Write;

use crate::result::BenchmarkResult;

/// Number of runs behind a saved record (1 when not aggregated).
pub fn runs_of(result: &BenchmarkResult) -> usize {
    result.metric("n_runs").map(|n| n as usize).unwrap_or(1)
}

fn num(result: &BenchmarkResult, metric: &str) -> f64 {
    result.metric(metric).unwrap_or(0.0)
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Optional size column; absent or zero prints `-`.
fn size(result: &BenchmarkResult, metric: &str) -> String {
    match result.metric(metric) {
        Some(v) if v != 0.0 => format!("{v:.1}"),
        _ => "-".to_string(),
    }
}

/// One-line summary printed after a candidate completes.
pub fn one_line(result: &BenchmarkResult, runs: usize) -> String {
    let stddev = if runs > 1 {
        format!(" (±{:.0})", num(result, "search_qps_stddev"))
    } else {
        String::new()
    };
    format!(
        "{}: {:.0} vec/sec insert, {:.0}{} QPS, {} recall",
        result.library(),
        num(result, "insert_throughput"),
        num(result, "search_qps"),
        stddev,
        percent(num(result, "recall_at_k")),
    )
}

/// Fixed-width comparison table.
///
/// With several runs the table shows mean ± stddev for throughput and QPS.
/// For single runs it shows latency percentiles, with storage and heap in
/// place of p99 when any candidate reports them.
pub fn summary_table(results: &[BenchmarkResult], runs: usize) -> String {
    let mut out = String::new();

    if runs > 1 {
        let _ = writeln!(
            out,
            "{:<25} {:<18} {:<18} {:<10}",
            "Library", "Insert (vec/s)", "Search QPS", "Recall@k"
        );
        let _ = writeln!(out, "{}", "-".repeat(71));
        for r in results {
            let insert = format!(
                "{:.0}±{:.0}",
                num(r, "insert_throughput"),
                num(r, "insert_throughput_stddev")
            );
            let qps = format!("{:.0}±{:.0}", num(r, "search_qps"), num(r, "search_qps_stddev"));
            let _ = writeln!(
                out,
                "{:<25} {:<18} {:<18} {:<10}",
                r.library(),
                insert,
                qps,
                percent(num(r, "recall_at_k"))
            );
        }
        return out;
    }

    let has_storage = results.iter().any(|r| r.get("total_storage_mb").is_some());
    if has_storage {
        let _ = writeln!(
            out,
            "{:<25} {:<14} {:<10} {:<10} {:<12} {:<10} {:<8}",
            "Library", "Insert (vec/s)", "QPS", "p50 (us)", "Storage (MB)", "Heap (MB)", "Recall"
        );
        let _ = writeln!(out, "{}", "-".repeat(95));
        for r in results {
            let _ = writeln!(
                out,
                "{:<25} {:<14.0} {:<10.0} {:<10.1} {:<12} {:<10} {:<8}",
                r.library(),
                num(r, "insert_throughput"),
                num(r, "search_qps"),
                num(r, "search_latency_p50_us"),
                size(r, "total_storage_mb"),
                size(r, "heap_mb"),
                percent(num(r, "recall_at_k"))
            );
        }
    } else {
        let _ = writeln!(
            out,
            "{:<25} {:<15} {:<12} {:<10} {:<10} {:<10}",
            "Library", "Insert (vec/s)", "Search QPS", "p50 (us)", "p99 (us)", "Recall@k"
        );
        let _ = writeln!(out, "{}", "-".repeat(82));
        for r in results {
            let _ = writeln!(
                out,
                "{:<25} {:<15.0} {:<12.0} {:<10.1} {:<10.1} {:<10}",
                r.library(),
                num(r, "insert_throughput"),
                num(r, "search_qps"),
                num(r, "search_latency_p50_us"),
                num(r, "search_latency_p99_us"),
                percent(num(r, "recall_at_k"))
            );
        }
    }
    out
}

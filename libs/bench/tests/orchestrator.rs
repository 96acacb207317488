//! End-to-end tests driving real candidate processes.
//!
//! Each candidate is a small `/bin/sh` script written into a temp dir that
//! follows the result protocol (or deliberately breaks it).

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use vecbench::{
    BenchError, Candidate, Dataset, IndexParams, Metric, Orchestrator, VectorSet,
};

fn tiny_dataset() -> Dataset {
    let base = VectorSet::from_rows(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let queries = VectorSet::from_rows(vec![vec![0.1, 0.0]]).unwrap();
    Dataset::new("tiny", Metric::L2, base, queries, vec![vec![0, 1]]).unwrap()
}

fn params() -> IndexParams {
    IndexParams {
        m: 8,
        ef_construction: 64,
        ef_search: 32,
        k: 2,
    }
}

/// Candidate running `body` through `/bin/sh`. Going through the shell
/// avoids exec'ing a file that was just written.
fn script_candidate(dir: &Path, name: &str, body: &str) -> Candidate {
    let path = dir.join(format!("{name}.sh"));
    fs::write(&path, body).unwrap();
    Candidate::Executable {
        name: name.to_string(),
        program: PathBuf::from("/bin/sh"),
        args: vec![path.display().to_string()],
    }
}

/// Emits a complete result; QPS is `$QPS` (default 1000).
const RESULT_SCRIPT: &str = r#"
echo "building index for $1" >&2
echo "inserted 3 vectors"
cat <<EOF
{"library": "fake", "dataset": "$1", "n_vectors": 3, "n_queries": 1, "dim": 2, "M": $2, "ef_construction": $3, "ef_search": $4, "k": 2, "insert_throughput": 500.0, "search_latency_mean_us": 12.5, "search_latency_p50_us": 11.0, "search_latency_p99_us": 30.0, "search_qps": ${QPS:-1000}, "recall_at_k": 1.0, "data_dir": "$VECBENCH_DATA_DIR", "cwd": "$(pwd)"}
EOF
"#;

fn orchestrator(tmp: &TempDir) -> Orchestrator {
    let data = tmp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    Orchestrator::new(data, tmp.path()).with_timeout(Duration::from_secs(30))
}

#[tokio::test]
async fn test_invoke_success() {
    let tmp = TempDir::new().unwrap();
    let candidate = script_candidate(tmp.path(), "fake", RESULT_SCRIPT);

    let result = orchestrator(&tmp)
        .invoke(&candidate, &tiny_dataset(), &params())
        .await
        .unwrap();

    assert_eq!(result.library(), "fake");
    assert_eq!(result.dataset(), "tiny");
    assert_eq!(result.metric("M"), Some(8.0));
    assert_eq!(result.metric("ef_construction"), Some(64.0));
    assert_eq!(result.metric("ef_search"), Some(32.0));
    assert_eq!(result.metric("search_qps"), Some(1000.0));
    assert_eq!(
        result.str_field("data_dir").map(PathBuf::from),
        Some(tmp.path().join("data"))
    );
    assert_eq!(
        result.str_field("cwd").map(|p| fs::canonicalize(p).unwrap()),
        Some(fs::canonicalize(tmp.path()).unwrap())
    );
}

#[tokio::test]
async fn test_nonzero_exit_is_candidate_failure() {
    let tmp = TempDir::new().unwrap();
    let candidate = script_candidate(
        tmp.path(),
        "broken",
        "echo 'partial output'\necho 'index build failed: out of memory' >&2\nexit 3\n",
    );

    let err = orchestrator(&tmp)
        .invoke(&candidate, &tiny_dataset(), &params())
        .await
        .unwrap_err();

    match err {
        BenchError::CandidateFailure {
            candidate,
            code,
            stderr,
        } => {
            assert_eq!(candidate, "broken");
            assert_eq!(code, Some(3));
            assert!(stderr.contains("out of memory"));
        }
        other => panic!("expected CandidateFailure, got {other}"),
    }
}

#[tokio::test]
async fn test_garbage_output_is_malformed_result() {
    let tmp = TempDir::new().unwrap();
    let candidate = script_candidate(tmp.path(), "chatty", "echo 'QPS: 1234'\necho 'done'\n");

    let err = orchestrator(&tmp)
        .invoke(&candidate, &tiny_dataset(), &params())
        .await
        .unwrap_err();

    match err {
        BenchError::MalformedResult { stdout, .. } => {
            assert!(stdout.contains("QPS: 1234"));
            assert!(stdout.contains("done"));
        }
        other => panic!("expected MalformedResult, got {other}"),
    }
}

#[tokio::test]
async fn test_missing_program_is_isolated_error() {
    let tmp = TempDir::new().unwrap();
    let candidate = Candidate::Executable {
        name: "ghost".into(),
        program: tmp.path().join("does-not-exist"),
        args: Vec::new(),
    };
    let err = orchestrator(&tmp)
        .invoke(&candidate, &tiny_dataset(), &params())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::Io(_)));
}

/// Whether `pid` is a live (non-zombie) process.
#[cfg(target_os = "linux")]
fn alive(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        // state is the first field after the parenthesized command name
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X"),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_process_group() {
    let tmp = TempDir::new().unwrap();
    let leader_pid = tmp.path().join("leader.pid");
    let child_pid = tmp.path().join("child.pid");
    let body = format!(
        "sleep 60 &\necho $! > {}\necho $$ > {}\necho 'warming up' >&2\nexec sleep 60\n",
        child_pid.display(),
        leader_pid.display()
    );
    let candidate = script_candidate(tmp.path(), "sleepy", &body);

    let started = Instant::now();
    let err = orchestrator(&tmp)
        .with_timeout(Duration::from_millis(500))
        .invoke(&candidate, &tiny_dataset(), &params())
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(20));

    match &err {
        BenchError::Timeout {
            candidate, stderr, ..
        } => {
            assert_eq!(candidate, "sleepy");
            assert!(stderr.contains("warming up"));
        }
        other => panic!("expected Timeout, got {other}"),
    }

    let pids: Vec<u32> = [&leader_pid, &child_pid]
        .iter()
        .map(|p| fs::read_to_string(p).unwrap().trim().parse().unwrap())
        .collect();

    // the orphaned background sleep is reaped by init asynchronously
    let deadline = Instant::now() + Duration::from_secs(5);
    while pids.iter().any(|&p| alive(p)) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    for pid in pids {
        assert!(!alive(pid), "process {pid} survived the timeout");
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_leftover_background_process_is_killed_after_success() {
    let tmp = TempDir::new().unwrap();
    let child_pid = tmp.path().join("child.pid");
    // the background sleep inherits stdout and keeps the pipe open
    let body = format!("sleep 60 &\necho $! > {}\n{RESULT_SCRIPT}", child_pid.display());
    let candidate = script_candidate(tmp.path(), "leaky", &body);

    let started = Instant::now();
    let result = orchestrator(&tmp)
        .invoke(&candidate, &tiny_dataset(), &params())
        .await
        .unwrap();
    assert_eq!(result.library(), "fake");
    assert!(started.elapsed() < Duration::from_secs(5));

    let pid: u32 = fs::read_to_string(&child_pid).unwrap().trim().parse().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!alive(pid), "background process {pid} survived");
}

#[tokio::test]
async fn test_suite_isolates_failing_candidate() {
    let tmp = TempDir::new().unwrap();
    let candidates = vec![
        script_candidate(tmp.path(), "broken", "echo 'segfault' >&2\nexit 139\n"),
        script_candidate(tmp.path(), "fake", RESULT_SCRIPT),
    ];

    let mut seen = Vec::new();
    let report = orchestrator(&tmp)
        .run_suite_with(&candidates, &tiny_dataset(), &params(), 1, |c, r| {
            seen.push((c.name().to_string(), r.is_some()));
        })
        .await;

    assert_eq!(
        seen,
        vec![("broken".to_string(), false), ("fake".to_string(), true)]
    );
    assert_eq!(report.dataset, "tiny");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].library(), "fake");
    assert_eq!(report.failed_candidates, vec!["broken".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        BenchError::CandidateFailure { code: Some(139), .. }
    ));
}

#[tokio::test]
async fn test_repeated_runs_are_aggregated() {
    let tmp = TempDir::new().unwrap();
    let counter = tmp.path().join("count");
    let body = format!(
        "n=$(cat {c} 2>/dev/null || echo 0)\nn=$((n + 1))\necho $n > {c}\nQPS=$((n * 100))\n{RESULT_SCRIPT}",
        c = counter.display()
    );
    let candidates = vec![script_candidate(tmp.path(), "fake", &body)];

    let report = orchestrator(&tmp)
        .run_suite(&candidates, &tiny_dataset(), &params(), 3)
        .await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    let agg = &report.results[0];
    assert_eq!(agg.n_runs(), 3);
    let qps = agg.stats("search_qps").unwrap();
    assert_eq!(qps.samples, vec![100.0, 200.0, 300.0]);
    assert!((qps.mean - 200.0).abs() < 1e-9);
    assert!((qps.stddev - 100.0).abs() < 1e-9);
    // constant across runs
    assert_eq!(agg.stats("recall_at_k").unwrap().stddev, 0.0);
}

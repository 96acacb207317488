//! End-to-end tests for the `bench_vector` CLI.
//!
//! These run the compiled binary against temp directories: ground truth on
//! hand-written fvecs files, a full `run` against a shell-script candidate,
//! and `summary` on the saved report.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;
use vecbench::codec;
use vecbench::VectorSet;

/// Run the CLI, returning (success, stdout, stderr).
fn run_cli(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_bench_vector"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute bench_vector");

    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn path_arg(p: &Path) -> String {
    p.display().to_string()
}

#[test]
fn test_ground_truth_command() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("base.fvecs");
    let queries = tmp.path().join("queries.fvecs");
    let out = tmp.path().join("gt.ivecs");

    let base_set = VectorSet::from_rows(vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![5.0, 5.0],
    ])
    .unwrap();
    codec::write_fvecs(&base, &base_set).unwrap();
    codec::write_fvecs(&queries, &VectorSet::from_rows(vec![vec![0.0, 0.0]]).unwrap()).unwrap();

    let (ok, stdout, stderr) = run_cli(&[
        "ground-truth",
        "--base",
        &path_arg(&base),
        "--queries",
        &path_arg(&queries),
        "--k",
        "2",
        "--metric",
        "l2",
        "--out",
        &path_arg(&out),
    ]);
    assert!(ok, "ground-truth failed: {stderr}");
    assert!(stdout.contains("top-2"));
    assert_eq!(codec::read_ivecs(&out).unwrap(), vec![vec![0, 1]]);
}

#[test]
fn test_ground_truth_rejects_bad_metric() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("base.fvecs");
    codec::write_fvecs(&base, &VectorSet::from_rows(vec![vec![1.0]]).unwrap()).unwrap();

    let (ok, _, stderr) = run_cli(&[
        "ground-truth",
        "--base",
        &path_arg(&base),
        "--queries",
        &path_arg(&base),
        "--metric",
        "hamming",
        "--out",
        &path_arg(&tmp.path().join("gt.ivecs")),
    ]);
    assert!(!ok);
    assert!(stderr.contains("unknown metric"));
}

#[test]
fn test_datasets_lists_catalog() {
    let tmp = TempDir::new().unwrap();
    let (ok, stdout, _) = run_cli(&["datasets", "--data-dir", &path_arg(tmp.path())]);
    assert!(ok);
    for name in ["sift10k", "sift1m", "glove10k", "glove100", "dbpedia-openai-1m"] {
        assert!(stdout.contains(name), "missing {name}");
    }
}

#[cfg(unix)]
#[test]
fn test_run_and_summary() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let results = tmp.path().join("results");

    // raw sift10k layout with a handful of vectors
    let raw = data.join("siftsmall");
    fs::create_dir_all(&raw).unwrap();
    let base = VectorSet::from_flat((0..20 * 128).map(|i| (i % 97) as f32).collect(), 128).unwrap();
    codec::write_fvecs(&raw.join("siftsmall_base.fvecs"), &base).unwrap();
    codec::write_fvecs(&raw.join("siftsmall_query.fvecs"), &base.truncated(2)).unwrap();
    codec::write_ivecs(&raw.join("siftsmall_groundtruth.ivecs"), &[vec![0, 1], vec![1, 0]]).unwrap();

    let script = tmp.path().join("fake.sh");
    fs::write(
        &script,
        r#"test -f "$VECBENCH_DATA_DIR/$1/base.fvecs" || exit 7
echo '{"library": "fake", "dataset": "sift10k", "n_vectors": 20, "n_queries": 2, "dim": 128, "M": 16, "ef_construction": 200, "ef_search": 100, "k": 10, "insert_throughput": 1000.0, "search_latency_mean_us": 5.0, "search_latency_p50_us": 4.0, "search_latency_p99_us": 9.0, "search_qps": 2000.0, "recall_at_k": 1.0}'
"#,
    )
    .unwrap();
    let exec = format!("fake=/bin/sh {}", script.display());

    let (ok, stdout, stderr) = run_cli(&[
        "run",
        "--dataset",
        "sift10k",
        "--only",
        "fake",
        "--exec",
        &exec,
        "--data-dir",
        &path_arg(&data),
        "--results-dir",
        &path_arg(&results),
        "--project-dir",
        &path_arg(tmp.path()),
        "--timeout-secs",
        "30",
    ]);
    assert!(ok, "run failed:\n{stdout}\n{stderr}");
    assert!(stdout.contains("fake: 1000 vec/sec insert, 2000 QPS, 100.00% recall"));
    assert!(data.join("sift10k").join("groundtruth.ivecs").exists());

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(results.join("sift10k.json")).unwrap()).unwrap();
    assert_eq!(saved[0]["library"], "fake");

    let (ok, stdout, _) = run_cli(&[
        "summary",
        "--dataset",
        "sift10k",
        "--results-dir",
        &path_arg(&results),
    ]);
    assert!(ok);
    assert!(stdout.lines().any(|l| l.starts_with("fake")));
}

#[cfg(unix)]
#[test]
fn test_run_reports_raw_output_of_malformed_result() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let raw = data.join("siftsmall");
    fs::create_dir_all(&raw).unwrap();
    let base = VectorSet::from_flat((0..4 * 128).map(|i| (i % 13) as f32).collect(), 128).unwrap();
    codec::write_fvecs(&raw.join("siftsmall_base.fvecs"), &base).unwrap();
    codec::write_fvecs(&raw.join("siftsmall_query.fvecs"), &base.truncated(1)).unwrap();
    codec::write_ivecs(&raw.join("siftsmall_groundtruth.ivecs"), &[vec![0, 1]]).unwrap();

    let script = tmp.path().join("chatty.sh");
    fs::write(&script, "echo 'QPS=1234 raw-summary-line'\n").unwrap();
    let exec = format!("chatty=/bin/sh {}", script.display());

    let (ok, stdout, stderr) = run_cli(&[
        "run",
        "--dataset",
        "sift10k",
        "--only",
        "chatty",
        "--exec",
        &exec,
        "--data-dir",
        &path_arg(&data),
        "--results-dir",
        &path_arg(&tmp.path().join("results")),
        "--project-dir",
        &path_arg(tmp.path()),
        "--timeout-secs",
        "30",
    ]);
    assert!(!ok, "run should fail with no results:\n{stdout}");
    assert!(stdout.contains("chatty: FAILED"));
    assert!(stderr.contains("malformed result"), "{stderr}");
    assert!(stderr.contains("Output was (stdout):\nQPS=1234 raw-summary-line"), "{stderr}");
}

#[test]
fn test_run_unknown_candidate_fails() {
    let tmp = TempDir::new().unwrap();
    let (ok, _, stderr) = run_cli(&[
        "run",
        "--only",
        "faiss",
        "--data-dir",
        &path_arg(tmp.path()),
    ]);
    assert!(!ok);
    assert!(stderr.contains("unknown candidate"));
}

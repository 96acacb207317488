//! Out-of-process benchmark orchestration.
//!
//! Each candidate run is a child process with captured stdout/stderr, run
//! in its own process group under a wall-clock limit. The last non-empty
//! stdout line is the result record; everything else on stdout and all of
//! stderr is treated as progress output.
//!
//! Invocations are strictly sequential: one controller task launches a run,
//! waits for it to exit (or kills it), and only then moves on.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, AggregatedResult};
use crate::candidate::{Candidate, CommandLine};
use crate::config::{BenchConfig, IndexParams};
use crate::dataset::DatasetHandle;
use crate::error::{BenchError, Result};
use crate::result::BenchmarkResult;

/// Environment variable pointing candidates at the dataset cache.
pub const DATA_DIR_ENV: &str = "VECBENCH_DATA_DIR";

/// Default per-invocation wall-clock limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Upper bound on draining output pipes once the child is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the pipes may stay open after the leader exits before the
/// rest of its process group is killed.
const PIPE_GRACE: Duration = Duration::from_millis(250);

/// Launches candidates and collects their results.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    data_dir: PathBuf,
    project_dir: PathBuf,
    timeout: Duration,
}

/// A failed run of one candidate.
#[derive(Debug)]
pub struct RunFailure {
    pub candidate: String,
    /// 1-based run number.
    pub run: usize,
    pub error: BenchError,
}

/// Outcome of repeated runs of one candidate.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<RunFailure>,
}

/// Outcome of a whole suite on one dataset.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub dataset: String,
    /// One entry per candidate with at least one successful run, in
    /// candidate order.
    pub results: Vec<AggregatedResult>,
    /// Candidates with no successful run.
    pub failed_candidates: Vec<String>,
    pub failures: Vec<RunFailure>,
}

impl Orchestrator {
    pub fn new(data_dir: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            project_dir: project_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &BenchConfig) -> Self {
        Self::new(&config.data_dir, &config.project_dir).with_timeout(config.timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `candidate` once on `dataset` and parse its result record.
    pub async fn invoke(
        &self,
        candidate: &Candidate,
        dataset: &dyn DatasetHandle,
        params: &IndexParams,
    ) -> Result<BenchmarkResult> {
        let name = candidate.name();
        let project_dir = std::path::absolute(&self.project_dir)?;
        let cmdline = candidate.command(dataset.name(), dataset.metric(), params, &project_dir);
        info!(candidate = name, dataset = dataset.name(), command = %cmdline, "Launching candidate");

        let mut child = self.spawn(&cmdline, &project_dir)?;
        let pid = child.id();
        let mut stdout = OutputReader::spawn(child.stdout.take());
        let mut stderr = OutputReader::spawn(child.stderr.take());

        let started = Instant::now();
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    candidate = name,
                    timeout_secs = self.timeout.as_secs(),
                    "Candidate timed out, killing process group"
                );
                kill_tree(&mut child, pid).await;
                stdout.abort();
                let stderr = stderr.collect(DRAIN_TIMEOUT).await;
                return Err(BenchError::Timeout {
                    candidate: name.to_string(),
                    timeout: self.timeout,
                    stderr,
                });
            }
        };

        // A group member still holding the pipes keeps the group id from
        // being reused, so the kill cannot reach an unrelated group.
        if !(stdout.closed_within(PIPE_GRACE).await && stderr.closed_within(PIPE_GRACE).await) {
            debug!(candidate = name, "Output pipes still open after exit, killing process group");
            kill_group(pid);
        }
        let stdout = stdout.collect(DRAIN_TIMEOUT).await;
        let stderr = stderr.collect(DRAIN_TIMEOUT).await;
        let elapsed = started.elapsed();

        if !stderr.is_empty() {
            debug!(candidate = name, stderr = %stderr, "Candidate stderr");
        }
        check_status(name, status, stderr)?;
        info!(
            candidate = name,
            elapsed_secs = elapsed.as_secs_f64(),
            "Candidate finished"
        );

        parse_result(name, &stdout)
    }

    /// Run `candidate` `runs` times in sequence, keeping every success and
    /// every failure.
    pub async fn invoke_repeated(
        &self,
        candidate: &Candidate,
        dataset: &dyn DatasetHandle,
        params: &IndexParams,
        runs: usize,
    ) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        for run in 1..=runs {
            if runs > 1 {
                info!(candidate = candidate.name(), run, runs, "Starting run");
            }
            match self.invoke(candidate, dataset, params).await {
                Ok(result) => outcome.results.push(result),
                Err(error) => {
                    warn!(candidate = candidate.name(), run, error = %error, "Run failed");
                    if let Some(output) = error.diagnostics().filter(|o| !o.trim().is_empty()) {
                        debug!(candidate = candidate.name(), run, output, "Captured output of failed run");
                    }
                    outcome.failures.push(RunFailure {
                        candidate: candidate.name().to_string(),
                        run,
                        error,
                    });
                }
            }
        }
        outcome
    }

    /// Run every candidate in order and aggregate each one's successful runs.
    ///
    /// A failing candidate never stops the ones after it.
    pub async fn run_suite(
        &self,
        candidates: &[Candidate],
        dataset: &dyn DatasetHandle,
        params: &IndexParams,
        runs: usize,
    ) -> SuiteReport {
        self.run_suite_with(candidates, dataset, params, runs, |_, _| {})
            .await
    }

    /// [`run_suite`](Self::run_suite), calling `on_candidate` after each
    /// candidate with its aggregate (`None` if every run failed).
    pub async fn run_suite_with<F>(
        &self,
        candidates: &[Candidate],
        dataset: &dyn DatasetHandle,
        params: &IndexParams,
        runs: usize,
        mut on_candidate: F,
    ) -> SuiteReport
    where
        F: FnMut(&Candidate, Option<&AggregatedResult>),
    {
        let mut report = SuiteReport {
            dataset: dataset.name().to_string(),
            ..SuiteReport::default()
        };

        for candidate in candidates {
            let outcome = self
                .invoke_repeated(candidate, dataset, params, runs)
                .await;
            report.failures.extend(outcome.failures);

            let aggregated = aggregate(&outcome.results);
            on_candidate(candidate, aggregated.as_ref());
            match aggregated {
                Some(result) => report.results.push(result),
                None => {
                    warn!(
                        candidate = candidate.name(),
                        "No successful runs, omitting from results"
                    );
                    report.failed_candidates.push(candidate.name().to_string());
                }
            }
        }

        info!(
            dataset = %report.dataset,
            succeeded = report.results.len(),
            failed = report.failed_candidates.len(),
            "Suite finished"
        );
        report
    }

    fn spawn(&self, cmdline: &CommandLine, project_dir: &Path) -> Result<Child> {
        let data_dir = std::path::absolute(&self.data_dir)?;
        let mut cmd = Command::new(&cmdline.program);
        cmd.args(&cmdline.args)
            .env(DATA_DIR_ENV, data_dir)
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|e| {
            BenchError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to launch {}: {e}", cmdline.program.display()),
            ))
        })
    }
}

/// Background reader for one output pipe. Bytes are appended to a shared
/// buffer as they arrive, so a reader that has to be abandoned still yields
/// everything read up to that point.
struct OutputReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl OutputReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(error = %e, "Error reading candidate output");
                        break;
                    }
                }
            }
        });
        Self { buf, task }
    }

    /// Wait up to `limit` for the pipe to reach end of stream.
    async fn closed_within(&mut self, limit: Duration) -> bool {
        if self.task.is_finished() {
            return true;
        }
        tokio::time::timeout(limit, &mut self.task).await.is_ok()
    }

    fn abort(&self) {
        self.task.abort();
    }

    /// Everything read so far, waiting up to `limit` for end of stream.
    async fn collect(mut self, limit: Duration) -> String {
        if !self.closed_within(limit).await {
            debug!("Output pipe still open after drain timeout, keeping partial output");
            self.task.abort();
        }
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// SIGKILL the child's process group, then kill and reap the child itself.
async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Failed to kill candidate");
    }
}

/// `pid` is the group leader's pid: children are spawned with
/// `process_group(0)`, so it doubles as the group id.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => debug!(pid, error = %e, "killpg failed"),
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

fn check_status(candidate: &str, status: ExitStatus, stderr: String) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    warn!(candidate, code = ?status.code(), "Candidate exited with failure");
    Err(BenchError::CandidateFailure {
        candidate: candidate.to_string(),
        code: status.code(),
        stderr,
    })
}

/// Parse the last non-empty stdout line as a result record.
pub fn parse_result(candidate: &str, stdout: &str) -> Result<BenchmarkResult> {
    let malformed = |reason: String| BenchError::MalformedResult {
        candidate: candidate.to_string(),
        reason,
        stdout: stdout.to_string(),
    };

    let line = stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .ok_or_else(|| malformed("no output on stdout".to_string()))?;

    let value: Value = serde_json::from_str(line)
        .map_err(|e| malformed(format!("last stdout line is not JSON: {e}")))?;
    let result = BenchmarkResult::from_value(value)
        .ok_or_else(|| malformed("last stdout line is not a JSON object".to_string()))?;

    let missing = result.missing_fields();
    if !missing.is_empty() {
        return Err(malformed(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    Ok(result)
}

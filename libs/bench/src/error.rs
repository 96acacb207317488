//! Error types for the benchmark engine.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while preparing datasets or driving candidates.
///
/// Dataset-side errors ([`BenchError::Format`], [`BenchError::Configuration`],
/// I/O) abort dataset preparation. Candidate-side errors
/// ([`BenchError::Timeout`], [`BenchError::CandidateFailure`],
/// [`BenchError::MalformedResult`]) are scoped to one invocation and carry the
/// captured output needed to diagnose it.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Malformed binary vector/neighbor data (truncated record, unreadable
    /// header, non-rectangular vector set, out-of-range neighbor index).
    #[error("format error: {0}")]
    Format(String),

    /// Candidate exceeded its wall-clock budget and was killed.
    #[error("candidate {candidate} timed out after {}s", .timeout.as_secs())]
    Timeout {
        candidate: String,
        timeout: Duration,
        stderr: String,
    },

    /// Candidate process exited unsuccessfully.
    #[error("candidate {candidate} failed with {}: {}", exit_label(*.code), stderr_tail(.stderr))]
    CandidateFailure {
        candidate: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Candidate output could not be read as a result record.
    #[error("candidate {candidate} produced a malformed result: {reason}")]
    MalformedResult {
        candidate: String,
        reason: String,
        stdout: String,
    },

    /// Unknown candidate or dataset name, or an invalid parameter combination.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// I/O error (file operations, process spawn)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error outside the candidate protocol
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error came from a candidate invocation (as opposed to
    /// dataset preparation or local I/O).
    pub fn is_candidate_error(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::CandidateFailure { .. } | Self::MalformedResult { .. }
        )
    }

    /// Captured diagnostic text, if any: stderr for process failures, raw
    /// stdout for malformed results.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Timeout { stderr, .. } | Self::CandidateFailure { stderr, .. } => Some(stderr),
            Self::MalformedResult { stdout, .. } => Some(stdout),
            _ => None,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Last few lines of stderr; full text stays available via `diagnostics()`.
fn stderr_tail(stderr: &str) -> String {
    const TAIL_LINES: usize = 5;
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return "<no stderr>".to_string();
    }
    lines[lines.len().saturating_sub(TAIL_LINES)..].join(" | ")
}

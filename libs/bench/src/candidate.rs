//! Registry of benchmark candidates and how each one is launched.
//!
//! Every candidate is an external program that takes
//! `<dataset> <M> <ef_construction> <ef_search>` (plus its own extras),
//! reads the prepared dataset from `VECBENCH_DATA_DIR`, and prints one JSON
//! result object as the last line of stdout.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::IndexParams;
use crate::error::{BenchError, Result};
use crate::ground_truth::Metric;

/// Names accepted by [`Candidate::from_name`], in suite order.
pub const CANDIDATE_NAMES: &[&str] = &[
    "proximum",
    "datalevin",
    "hnswlib",
    "jvector",
    "lucene",
    "hnswlib-java",
];

const JVM_NATIVE_ACCESS: &str = "-J--enable-native-access=ALL-UNNAMED";
const JVM_VECTOR_MODULE: &str = "-J--add-modules=jdk.incubator.vector";
const DATALEVIN_DEPS: &str = r#"{:paths ["benchmark"] :deps {datalevin/datalevin {:mvn/version "0.9.27"} org.clojure/data.json {:mvn/version "2.5.1"}}}"#;

/// Settings that only some candidates consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOptions {
    pub threads: usize,
    pub warmup: usize,
    pub python: Option<PathBuf>,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self {
            threads: 8,
            warmup: 1,
            python: None,
        }
    }
}

/// A candidate search engine and its invocation strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Clojure HNSW with a persistent edge store.
    Proximum { threads: usize, warmup: usize },
    /// Datalevin's usearch binding.
    Datalevin,
    /// Reference C++ hnswlib via its Python binding.
    Hnswlib { python: Option<PathBuf> },
    JVector,
    Lucene,
    HnswlibJava,
    /// Any program speaking the result protocol. `args` go before the
    /// positional parameters.
    Executable {
        name: String,
        program: PathBuf,
        args: Vec<String>,
    },
}

/// Program and argument vector for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl Candidate {
    /// Look up a built-in candidate. `pv` is accepted for `proximum`.
    pub fn from_name(name: &str, opts: &CandidateOptions) -> Result<Self> {
        match name {
            "proximum" | "pv" => Ok(Candidate::Proximum {
                threads: opts.threads,
                warmup: opts.warmup,
            }),
            "datalevin" => Ok(Candidate::Datalevin),
            "hnswlib" => Ok(Candidate::Hnswlib {
                python: opts.python.clone(),
            }),
            "jvector" => Ok(Candidate::JVector),
            "lucene" => Ok(Candidate::Lucene),
            "hnswlib-java" => Ok(Candidate::HnswlibJava),
            other => Err(BenchError::config(format!(
                "unknown candidate '{other}' (known: {})",
                CANDIDATE_NAMES.join(", ")
            ))),
        }
    }

    /// All built-in candidates in suite order.
    pub fn builtin(opts: &CandidateOptions) -> Vec<Self> {
        CANDIDATE_NAMES
            .iter()
            .filter_map(|name| Self::from_name(name, opts).ok())
            .collect()
    }

    /// Generic candidate from a `name=program [args...]` spec.
    pub fn parse_executable(spec: &str) -> Result<Self> {
        let (name, command) = spec
            .split_once('=')
            .ok_or_else(|| BenchError::config(format!("expected name=program, got '{spec}'")))?;
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| BenchError::config(format!("no program given for '{name}'")))?;
        if name.is_empty() {
            return Err(BenchError::config(format!("no name given in '{spec}'")));
        }
        Ok(Candidate::Executable {
            name: name.to_string(),
            program: PathBuf::from(program),
            args: parts.map(str::to_string).collect(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Candidate::Proximum { .. } => "proximum",
            Candidate::Datalevin => "datalevin",
            Candidate::Hnswlib { .. } => "hnswlib",
            Candidate::JVector => "jvector",
            Candidate::Lucene => "lucene",
            Candidate::HnswlibJava => "hnswlib-java",
            Candidate::Executable { name, .. } => name,
        }
    }

    /// Build the command line for one run on `dataset`.
    pub fn command(
        &self,
        dataset: &str,
        metric: Metric,
        params: &IndexParams,
        project_dir: &Path,
    ) -> CommandLine {
        let positional = [
            dataset.to_string(),
            params.m.to_string(),
            params.ef_construction.to_string(),
            params.ef_search.to_string(),
        ];
        let heap = jvm_heap_flag(dataset);

        let (program, mut args): (PathBuf, Vec<String>) = match self {
            Candidate::Proximum { .. } => (
                "clojure".into(),
                strings(&[heap, JVM_VECTOR_MODULE, JVM_NATIVE_ACCESS, "-M:dev", "-m", "bench-proximum"]),
            ),
            Candidate::Datalevin => (
                "clojure".into(),
                strings(&["-Sdeps", DATALEVIN_DEPS, heap, JVM_NATIVE_ACCESS, "-M", "-m", "bench-datalevin"]),
            ),
            Candidate::Hnswlib { python } => {
                let script = project_dir.join("benchmark").join("hnswlib_bench.py");
                (
                    resolve_python(python.as_deref(), project_dir),
                    vec![script.display().to_string()],
                )
            }
            Candidate::JVector => (
                "clojure".into(),
                strings(&[heap, JVM_VECTOR_MODULE, JVM_NATIVE_ACCESS, "-M:benchmark", "-m", "bench-jvector"]),
            ),
            Candidate::Lucene => (
                "clojure".into(),
                strings(&[heap, "-M:benchmark", "-m", "bench-lucene"]),
            ),
            Candidate::HnswlibJava => (
                "clojure".into(),
                strings(&[heap, "-M:benchmark", "-m", "bench-hnswlib-java"]),
            ),
            Candidate::Executable { program, args, .. } => (program.clone(), args.clone()),
        };

        args.extend(positional);
        if let Candidate::Proximum { threads, warmup } = self {
            args.push(threads.to_string());
            args.push(warmup.to_string());
            if metric == Metric::Angular {
                args.push("--cosine".to_string());
            }
        }

        CommandLine { program, args }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 8 GB for million-scale datasets, 4 GB otherwise.
pub fn jvm_heap_flag(dataset: &str) -> &'static str {
    if dataset.contains("1m") {
        "-J-Xmx8g"
    } else {
        "-J-Xmx4g"
    }
}

fn resolve_python(configured: Option<&Path>, project_dir: &Path) -> PathBuf {
    if let Some(python) = configured {
        return python.to_path_buf();
    }
    let venv = project_dir.join("benchmark-env").join("bin").join("python");
    if venv.exists() {
        venv
    } else {
        PathBuf::from("python3")
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

//! CLI command implementations for vector benchmarks.
//!
//! - Datasets / Candidates: list what the suite knows about
//! - Prepare: build the prepared dataset cache
//! - GroundTruth: brute-force neighbors for arbitrary fvecs files
//! - Run: drive all candidates and save the aggregated report
//! - Summary: re-print a saved report

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use vecbench::codec;
use vecbench::dataset::DEFAULT_GROUND_TRUTH_DEPTH;
use vecbench::report::{one_line, runs_of, summary_table};
use vecbench::{
    ground_truth, BenchConfig, BenchError, Candidate, DatasetCache, DatasetCatalog, DatasetHandle,
    Metric, Orchestrator, ResultStore, VectorSet,
};

// ============================================================================
// Datasets Command
// ============================================================================

#[derive(Parser)]
pub struct DatasetsArgs {
    /// Cache directory to check for prepared datasets
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,
}

pub fn list_datasets(args: DatasetsArgs) -> Result<()> {
    let catalog = DatasetCatalog::builtin();
    let cache = DatasetCache::new(&args.data_dir);

    println!("Available datasets:\n");
    println!("{:<22} {:<8} {:<6} {:<10} Description", "Name", "Metric", "Dim", "Prepared");
    println!("{}", "-".repeat(90));
    for spec in catalog.iter() {
        let prepared = match cache.metadata(spec.name) {
            Some(meta) => format!("k={}", meta.k),
            None => "no".to_string(),
        };
        println!(
            "{:<22} {:<8} {:<6} {:<10} {}",
            spec.name, spec.metric, spec.dim, prepared, spec.description
        );
    }

    println!("\nRaw files are read from {}/<source dir>:", args.data_dir.display());
    for spec in catalog.iter() {
        println!("  {:<22} {}/ ({})", spec.name, spec.source_dir, spec.source_url);
    }
    Ok(())
}

// ============================================================================
// Prepare Command
// ============================================================================

#[derive(Parser)]
pub struct PrepareArgs {
    /// Dataset name (see `bench_vector datasets`)
    #[arg(long)]
    pub dataset: String,

    /// Dataset cache directory
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Ground-truth depth (neighbors per query)
    #[arg(long, default_value_t = DEFAULT_GROUND_TRUTH_DEPTH)]
    pub k: usize,
}

pub fn prepare(args: PrepareArgs) -> Result<()> {
    let catalog = DatasetCatalog::builtin();
    let spec = catalog.get(&args.dataset)?;
    let cache = DatasetCache::new(&args.data_dir);

    let start = Instant::now();
    let dataset = cache
        .prepare(spec, args.k)
        .with_context(|| format!("Failed to prepare dataset '{}'", args.dataset))?;

    println!("Dataset:      {}", dataset.name());
    println!("Metric:       {}", dataset.metric());
    println!("Dimension:    {}", dataset.dim());
    println!("Base vectors: {}", dataset.base().len());
    println!("Queries:      {}", dataset.queries().len());
    println!("GT depth:     {}", dataset.ground_truth_depth());
    println!("Location:     {}", cache.prepared_dir(dataset.name()).display());
    println!("Elapsed:      {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

// ============================================================================
// Ground Truth Command
// ============================================================================

#[derive(Parser)]
pub struct GroundTruthArgs {
    /// Base vectors (fvecs)
    #[arg(long)]
    pub base: PathBuf,

    /// Query vectors (fvecs)
    #[arg(long)]
    pub queries: PathBuf,

    /// Neighbors per query
    #[arg(long, default_value_t = DEFAULT_GROUND_TRUTH_DEPTH)]
    pub k: usize,

    /// Metric: l2, angular (or cosine)
    #[arg(long, default_value = "l2")]
    pub metric: String,

    /// Output file (ivecs)
    #[arg(long)]
    pub out: PathBuf,
}

pub fn ground_truth(args: GroundTruthArgs) -> Result<()> {
    let metric: Metric = args.metric.parse()?;
    let base = VectorSet::from_rows(
        codec::read_fvecs(&args.base)
            .with_context(|| format!("Failed to read {}", args.base.display()))?,
    )?;
    let queries = VectorSet::from_rows(
        codec::read_fvecs(&args.queries)
            .with_context(|| format!("Failed to read {}", args.queries.display()))?,
    )?;

    let start = Instant::now();
    let neighbors = ground_truth::compute_parallel(&base, &queries, args.k, metric)?;
    codec::write_ivecs(&args.out, &neighbors)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    println!(
        "Computed {} x top-{} ({}) over {} base vectors in {:.2}s -> {}",
        neighbors.len(),
        args.k,
        metric,
        base.len(),
        start.elapsed().as_secs_f64(),
        args.out.display()
    );
    Ok(())
}

// ============================================================================
// Candidates Command
// ============================================================================

#[derive(Parser)]
pub struct CandidatesArgs {
    /// Show command lines for this dataset
    #[arg(long, default_value = "sift10k")]
    pub dataset: String,

    /// Project directory candidates run in
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,
}

pub fn list_candidates(args: CandidatesArgs) -> Result<()> {
    let config = BenchConfig::default().with_project_dir(&args.project_dir);
    let metric = DatasetCatalog::builtin()
        .get(&args.dataset)
        .map(|s| s.metric)
        .unwrap_or(Metric::L2);

    println!("Registered candidates (dataset {}):\n", args.dataset);
    for candidate in Candidate::builtin(&config.candidate_options()) {
        let cmd = candidate.command(&args.dataset, metric, &config.params, &config.project_dir);
        println!("  {:<14} {}", candidate.name(), cmd);
    }
    println!("\nAdd others with: bench_vector run --exec name=/path/to/program");
    Ok(())
}

// ============================================================================
// Run Command
// ============================================================================

#[derive(Parser)]
pub struct RunArgs {
    /// Dataset name (see `bench_vector datasets`)
    #[arg(long, default_value = "sift10k")]
    pub dataset: String,

    /// JSON config file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run only this candidate (built-in or --exec name)
    #[arg(long)]
    pub only: Option<String>,

    /// Extra candidate as name=program (repeatable)
    #[arg(long = "exec", value_name = "NAME=PROGRAM")]
    pub exec: Vec<String>,

    /// Runs per candidate for variance measurement
    #[arg(long)]
    pub runs: Option<usize>,

    /// HNSW M parameter (max neighbors per node)
    #[arg(long)]
    pub m: Option<usize>,

    /// ef during construction
    #[arg(long)]
    pub ef_construction: Option<usize>,

    /// ef during search
    #[arg(long)]
    pub ef_search: Option<usize>,

    /// Neighbors per query
    #[arg(long)]
    pub k: Option<usize>,

    /// Insert threads (proximum)
    #[arg(long)]
    pub threads: Option<usize>,

    /// JVM warmup rounds before measurement (proximum)
    #[arg(long)]
    pub warmup: Option<usize>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Python interpreter for hnswlib (default: project venv, then python3)
    #[arg(long)]
    pub python: Option<PathBuf>,

    /// Dataset cache directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Report directory
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Working directory for candidate processes
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Use the already prepared dataset without rebuilding it
    #[arg(long)]
    pub skip_prepare: bool,
}

impl RunArgs {
    fn to_config(&self) -> Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => BenchConfig::default(),
        };

        if let Some(runs) = self.runs {
            config = config.with_runs(runs);
        }
        let mut params = config.params;
        if let Some(m) = self.m {
            params.m = m;
        }
        if let Some(ef) = self.ef_construction {
            params.ef_construction = ef;
        }
        if let Some(ef) = self.ef_search {
            params.ef_search = ef;
        }
        if let Some(k) = self.k {
            params.k = k;
        }
        config = config.with_params(params);
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if let Some(warmup) = self.warmup {
            config = config.with_warmup(warmup);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(python) = &self.python {
            config = config.with_python(python);
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(dir) = &self.results_dir {
            config = config.with_results_dir(dir);
        }
        if let Some(dir) = &self.project_dir {
            config = config.with_project_dir(dir);
        }

        config.validate()?;
        Ok(config)
    }

    fn candidates(&self, config: &BenchConfig) -> Result<Vec<Candidate>> {
        let mut all = Candidate::builtin(&config.candidate_options());
        for spec in &self.exec {
            all.push(Candidate::parse_executable(spec)?);
        }
        match &self.only {
            None => Ok(all),
            Some(name) => {
                let picked: Vec<Candidate> = all
                    .into_iter()
                    .filter(|c| c.name() == name.as_str() || (name == "pv" && c.name() == "proximum"))
                    .collect();
                if picked.is_empty() {
                    // reports the list of known names
                    Candidate::from_name(name, &config.candidate_options())?;
                }
                Ok(picked)
            }
        }
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = args.to_config()?;
    let candidates = args.candidates(&config)?;
    let catalog = DatasetCatalog::builtin();
    let spec = catalog.get(&args.dataset)?;
    let params = config.params;

    println!("{}", "=".repeat(60));
    println!("ANN Benchmark Suite");
    println!("{}", "=".repeat(60));
    println!("Dataset: {}", spec.name);
    println!(
        "Parameters: M={}, ef_construction={}, ef_search={}, k={}",
        params.m, params.ef_construction, params.ef_search, params.k
    );
    println!(
        "Runs: {}, Threads: {}, Warmup: {}, Timeout: {}s",
        config.runs,
        config.threads,
        config.warmup,
        config.timeout.as_secs()
    );

    let cache = DatasetCache::new(&config.data_dir);
    let dataset = if args.skip_prepare {
        cache.open(spec.name)
    } else {
        cache.prepare(spec, params.k.max(DEFAULT_GROUND_TRUTH_DEPTH))
    }
    .with_context(|| format!("Dataset '{}' is not available", spec.name))?;

    let orchestrator = Orchestrator::from_config(&config);
    let report = orchestrator
        .run_suite_with(&candidates, &dataset, &params, config.runs, |candidate, result| {
            match result {
                Some(agg) => println!("\n{}", one_line(&agg.to_result(), agg.n_runs())),
                None => println!("\n{}: FAILED (see log)", candidate.name()),
            }
        })
        .await;

    for failure in &report.failures {
        eprintln!(
            "{} run {}: {}",
            failure.candidate, failure.run, failure.error
        );
        if let Some(output) = failure.error.diagnostics() {
            let output = output.trim_end();
            if !output.is_empty() {
                let stream = match failure.error {
                    BenchError::MalformedResult { .. } => "stdout",
                    _ => "stderr",
                };
                eprintln!("Output was ({stream}):\n{output}");
            }
        }
    }

    if report.results.is_empty() {
        bail!("No candidate produced a result for {}", spec.name);
    }

    let store = ResultStore::new(&config.results_dir);
    let path = store.save(&report.dataset, &report.results)?;
    println!("\n{}", "=".repeat(60));
    println!("Results saved to {}", path.display());

    let records: Vec<_> = report.results.iter().map(|r| r.to_result()).collect();
    println!("\n{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));
    print!("{}", summary_table(&records, config.runs));

    if !report.failed_candidates.is_empty() {
        println!("\nFailed: {}", report.failed_candidates.join(", "));
    }
    Ok(())
}

// ============================================================================
// Summary Command
// ============================================================================

#[derive(Parser)]
pub struct SummaryArgs {
    /// Dataset whose report to print
    #[arg(long, default_value = "sift10k")]
    pub dataset: String,

    /// Report directory
    #[arg(long, default_value = "./results")]
    pub results_dir: PathBuf,
}

pub fn summary(args: SummaryArgs) -> Result<()> {
    let store = ResultStore::new(&args.results_dir);
    let results = store
        .load(&args.dataset)
        .with_context(|| format!("No saved report at {}", store.path(&args.dataset).display()))?;

    let runs = results.iter().map(runs_of).max().unwrap_or(1);
    println!("{} ({} candidates)\n", args.dataset, results.len());
    print!("{}", summary_table(&results, runs));
    Ok(())
}

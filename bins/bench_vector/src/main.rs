//! Vector benchmark CLI tool.
//!
//! Drives external ANN engines through an identical insert/search workload
//! and compares their throughput, latency and recall.
//!
//! ## Commands
//!
//! ```bash
//! # List known datasets and whether they are prepared
//! bench_vector datasets --data-dir ./data
//!
//! # Build the prepared cache (subset + exact ground truth)
//! bench_vector prepare --dataset sift10k --data-dir ./data
//!
//! # Run every candidate three times and print mean ± stddev
//! bench_vector run --dataset sift10k --runs 3
//!
//! # Benchmark your own engine alongside the built-ins
//! bench_vector run --dataset glove10k --exec mine=./target/release/my_bench --only mine
//!
//! # Re-print the table for a saved report
//! bench_vector summary --dataset sift10k
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use vecbench_core::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "bench_vector")]
#[command(version, about = "Benchmark harness for approximate nearest-neighbor search engines")]
struct Cli {
    /// Verbose output (debug logging, including candidate stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available datasets
    Datasets(commands::DatasetsArgs),

    /// Prepare a dataset in the cache (subset + exact ground truth)
    Prepare(commands::PrepareArgs),

    /// Compute exact ground truth for arbitrary fvecs files
    GroundTruth(commands::GroundTruthArgs),

    /// List registered candidates and their command lines
    Candidates(commands::CandidatesArgs),

    /// Run the benchmark suite on a dataset
    Run(commands::RunArgs),

    /// Print the summary table of a saved report
    Summary(commands::SummaryArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        telemetry::init_dev_subscriber(Level::DEBUG);
    } else {
        telemetry::init_dev_subscriber_with_env_filter();
    }

    match cli.command {
        Commands::Datasets(args) => commands::list_datasets(args),
        Commands::Prepare(args) => commands::prepare(args),
        Commands::GroundTruth(args) => commands::ground_truth(args),
        Commands::Candidates(args) => commands::list_candidates(args),
        Commands::Run(args) => commands::run(args).await,
        Commands::Summary(args) => commands::summary(args),
    }
}

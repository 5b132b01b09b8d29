//! rtsvm command line interface
//!
//! Runs the transductive trainer on synthetic two-blob data and times
//! parallel Gram matrix computations.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rtsvm::data::{gaussian_blobs, split_labeled, BlobConfig};
use rtsvm::{
    Chunking, IndexedKernel, Kernel, LinearKernel, ParallelConfig, ParallelOperator, RbfKernel,
    Result, SVMError, Sample, SparseVector, TrainingSummary, TransductiveConfig,
    TransductiveTrainer, WeightedSumKernel,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "rtsvm")]
#[command(about = "Kernel machines with transductive SVM training")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train transductively on two Gaussian blobs and score the unlabeled part
    Blobs(BlobsArgs),
    /// Time a composite kernel Gram matrix on random points
    Gram(GramArgs),
}

#[derive(Args)]
struct BlobsArgs {
    /// Points generated per class
    #[arg(long, default_value = "100")]
    per_class: usize,

    /// Labeled points per class; the rest are unlabeled
    #[arg(long, default_value = "10")]
    labeled: usize,

    /// RBF kernel width
    #[arg(long, default_value = "1.0")]
    gamma: f64,

    /// Regularization parameter C
    #[arg(short = 'C', long, default_value = "100.0")]
    c: f64,

    /// Starting value of the annealed regularization bounds
    #[arg(long, default_value = "1e-5")]
    c_init: f64,

    /// Standard deviation of each blob
    #[arg(long, default_value = "0.5")]
    noise: f64,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of positive pseudo-labels (estimated from the labeled set if omitted)
    #[arg(long)]
    numplus: Option<usize>,

    /// Cap on pseudo-label swaps per annealing round
    #[arg(long)]
    max_swaps: Option<usize>,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,

    /// Write the JSON report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct GramArgs {
    /// Number of random points
    #[arg(long, default_value = "500")]
    samples: usize,

    /// Dimension of each point
    #[arg(long, default_value = "16")]
    dim: usize,

    /// Worker threads (defaults to the available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Rows per parallel task (defaults to one row per task)
    #[arg(long)]
    chunk_rows: Option<usize>,

    /// Also build an indexed kernel over the same points
    #[arg(long)]
    indexed: bool,

    /// Random seed
    #[arg(long, default_value = "7")]
    seed: u64,
}

#[derive(Serialize)]
struct BlobsReport {
    timestamp: DateTime<Utc>,
    version: &'static str,
    labeled: usize,
    unlabeled: usize,
    gamma: f64,
    config: TransductiveConfig,
    accuracy: f64,
    summary: TrainingSummary,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Blobs(args) => blobs_command(args),
        Commands::Gram(args) => gram_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn blobs_command(args: BlobsArgs) -> Result<()> {
    if args.gamma <= 0.0 || !args.gamma.is_finite() {
        return Err(SVMError::InvalidParameter(format!(
            "gamma must be positive, got {}",
            args.gamma
        )));
    }

    let blob_config = BlobConfig::default()
        .with_per_class(args.per_class)
        .with_noise(args.noise)
        .with_seed(args.seed);
    let split = split_labeled(gaussian_blobs(&blob_config)?, args.labeled);
    info!(
        "Generated {} labeled and {} unlabeled samples",
        split.labeled.len(),
        split.unlabeled.len()
    );

    let config = TransductiveConfig {
        c: args.c,
        c_init: args.c_init,
        max_swaps_per_round: args.max_swaps,
    };
    let kernel: Arc<dyn Kernel<SparseVector>> = Arc::new(RbfKernel::new(args.gamma));
    let mut trainer = TransductiveTrainer::new(kernel).with_config(config);
    trainer.set_numplus(args.numplus);

    let started = Instant::now();
    let summary = trainer.train(&split.labeled, &split.unlabeled)?.clone();
    let elapsed = started.elapsed();

    let accuracy = accuracy(&trainer, &split.unlabeled)?;
    let report = BlobsReport {
        timestamp: Utc::now(),
        version: rtsvm::VERSION,
        labeled: split.labeled.len(),
        unlabeled: split.unlabeled.len(),
        gamma: args.gamma,
        config,
        accuracy,
        summary,
    };

    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Report written to {path:?}");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("=== Transductive Training ===");
        println!("  Labeled:          {}", report.labeled);
        println!("  Unlabeled:        {}", report.unlabeled);
        println!("  numplus:          {}", report.summary.numplus);
        println!("  Annealing rounds: {}", report.summary.outer_iterations);
        println!("  Swaps:            {}", report.summary.swaps);
        println!("  Retrains:         {}", report.summary.retrains);
        println!("  Training time:    {:.2?}", elapsed);
        println!("  Accuracy:         {:.2}%", report.accuracy * 100.0);
    }

    Ok(())
}

/// Fraction of unlabeled samples whose predicted sign matches the ground truth
fn accuracy(
    trainer: &TransductiveTrainer<SparseVector>,
    unlabeled: &[Sample<SparseVector>],
) -> Result<f64> {
    if unlabeled.is_empty() {
        return Ok(1.0);
    }
    let mut correct = 0;
    for sample in unlabeled {
        if trainer.predict(&sample.value)?.label == sample.label {
            correct += 1;
        }
    }
    Ok(correct as f64 / unlabeled.len() as f64)
}

fn gram_command(args: GramArgs) -> Result<()> {
    let mut config = ParallelConfig::default();
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(rows) = args.chunk_rows {
        config = config.with_chunking(Chunking::Rows(rows));
    }
    let operator = ParallelOperator::new(config);

    let mut rng = StdRng::seed_from_u64(args.seed);
    let samples: Vec<Sample<SparseVector>> = (0..args.samples)
        .map(|_| {
            let values: Vec<f64> = (0..args.dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            Sample::unlabeled(SparseVector::dense(&values))
        })
        .collect();

    let kernel = WeightedSumKernel::<SparseVector>::with_operator(operator)
        .with_kernel(Arc::new(RbfKernel::with_auto_gamma(args.dim.max(1))), 0.7)
        .with_kernel(Arc::new(LinearKernel::new()), 0.3);

    let started = Instant::now();
    let matrix = kernel.kernel_matrix(&samples)?;
    let elapsed = started.elapsed();

    println!(
        "Computed {n}x{n} Gram matrix in {elapsed:.2?} (symmetric: {})",
        matrix.is_symmetric(1e-12),
        n = matrix.dim()
    );

    if args.indexed {
        let started = Instant::now();
        let indexed = IndexedKernel::build_with(
            &kernel,
            samples.into_iter().enumerate().map(|(i, s)| (i, s.value)),
            &operator,
        )?;
        println!(
            "Built indexed kernel over {} keys in {:.2?} ({} bytes)",
            indexed.len(),
            started.elapsed(),
            indexed.memory_bytes()
        );
    }

    Ok(())
}

use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::{Env, Target};
use shardprep::metrics::bytes_to_mebibytes;
use shardprep::{Pipeline, PipelineConfig, PipelineReport, RatioSplit, RunReport};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compressed corpus shard extractor", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    /// Write log records to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract sampled shards into train/validation text and a character vocabulary
    Extract(ExtractArgs),
    /// List discovered shards and the train/validation selection without extracting
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Directory holding compressed shards
    #[arg(value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Fraction of shards assigned to training
    #[arg(long, value_name = "RATIO")]
    train_ratio: Option<f64>,

    /// Fraction of each partition to extract
    #[arg(long, value_name = "RATE")]
    sample_rate: Option<f64>,

    /// Seed for reproducible sampling
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Emit JSON instead of human-readable output
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    plan: PlanArgs,

    /// Output path for training text
    #[arg(long, value_name = "PATH")]
    train_output: Option<PathBuf>,

    /// Output path for validation text
    #[arg(long, value_name = "PATH")]
    val_output: Option<PathBuf>,

    /// Output path for the character vocabulary
    #[arg(long, value_name = "PATH")]
    vocab_output: Option<PathBuf>,

    /// Number of concurrent shard workers
    #[arg(short = 'j', long, value_name = "N")]
    workers: Option<usize>,

    /// Decoded chunk size in bytes
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Directory for scratch files (defaults to the system temp dir)
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    plan: PlanArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.log_file.as_ref())?;

    match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Scan(args) => run_scan(args),
    }
}

fn init_logging(verbose: u8, quiet: u8, log_file: Option<&PathBuf>) -> Result<()> {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    // RUST_LOG decides unless -v/-q was given
    if verbose > 0 || quiet > 0 {
        builder.filter_level(level);
    }
    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory {}", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    let _ = builder.try_init();
    Ok(())
}

fn load_config(args: &PlanArgs) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(source) = &args.source {
        cfg.source_dir = source.clone();
    }
    if let Some(ratio) = args.train_ratio {
        cfg.split.train_ratio = ratio;
    }
    if let Some(rate) = args.sample_rate {
        cfg.split.sample_rate = rate;
    }
    if args.seed.is_some() {
        cfg.split.seed = args.seed;
    }
    Ok(cfg)
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let mut cfg = load_config(&args.plan)?;
    if let Some(path) = args.train_output {
        cfg.train_output = path;
    }
    if let Some(path) = args.val_output {
        cfg.validation_output = path;
    }
    if let Some(path) = args.vocab_output {
        cfg.vocab_output = path;
    }
    if let Some(workers) = args.workers {
        cfg.extract.parallelism = workers;
    }
    if let Some(chunk_size) = args.chunk_size {
        cfg.extract.chunk_size = chunk_size;
    }
    if args.scratch_dir.is_some() {
        cfg.scratch_root = args.scratch_dir;
    }
    if args.no_progress || args.plan.json {
        cfg.extract.show_progress = false;
    }

    let source = cfg.source_dir.clone();
    let report = Pipeline::new(cfg)
        .run()
        .with_context(|| format!("extraction from {} failed", source.display()))?;

    if args.plan.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_report(&report);
    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let cfg = load_config(&args.plan)?;
    let pipeline = Pipeline::new(cfg);
    let plan = pipeline
        .plan(&RatioSplit::new(pipeline.config().split.clone()))
        .with_context(|| {
            format!(
                "failed to scan {}",
                pipeline.config().source_dir.display()
            )
        })?;

    if args.plan.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }
    println!("Source        : {}", pipeline.config().source_dir.display());
    println!("Discovered    : {}", plan.discovered.len());
    println!("Train shards  : {}", plan.split.train.len());
    for shard in &plan.split.train {
        println!("  {shard}");
    }
    println!("Val shards    : {}", plan.split.validation.len());
    for shard in &plan.split.validation {
        println!("  {shard}");
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    for run in [&report.train, &report.validation] {
        print_run(run);
    }
    println!(
        "wrote vocabulary of {} characters to {} ({} shards ok, {} failed, {:.2?})",
        report.vocab_size,
        report.vocab_output.display(),
        report.succeeded(),
        report.failed(),
        report.total_duration
    );
}

fn print_run(run: &RunReport) {
    println!(
        "{:<10} {} | shards {}/{} | {:.2} MiB | {:.2} MiB/s",
        run.label,
        run.output.display(),
        run.succeeded,
        run.shards,
        bytes_to_mebibytes(run.bytes_written),
        run.throughput_mib_s()
    );
    for failure in &run.failures {
        println!("  failed [{}] {}: {}", failure.index, failure.shard, failure.reason);
    }
}

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use dualvo::{FusionMethod, StepMode, TrackerStrategy};
use dualvo_bench::config::BenchConfig;
use dualvo_bench::io::create_run_dir;
use dualvo_bench::runner::run_benchmark;

#[derive(Debug, Parser)]
#[command(name = "dualvo-bench")]
#[command(about = "Synthetic benchmark for dual-estimator visual odometry fusion")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "output-dualvo-bench")]
    outdir: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    frames: Option<usize>,

    /// equal_average or weighted_average
    #[arg(long)]
    method: Option<String>,

    /// Two tracker strategies, e.g. BRISK,LK_FAST
    #[arg(long)]
    strategies: Option<String>,

    /// Fusion weights w1,w2 (weighted_average only)
    #[arg(long)]
    weights: Option<String>,

    #[arg(long, default_value_t = false)]
    parallel: bool,
}

fn resolve_default_config_path() -> PathBuf {
    let local = PathBuf::from("configs").join("default.toml");
    if local.exists() {
        return local;
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("configs")
        .join("default.toml")
}

fn parse_method(raw: &str) -> Result<FusionMethod> {
    match raw.trim().to_lowercase().as_str() {
        "equal" | "equal_average" => Ok(FusionMethod::EqualAverage),
        "weighted" | "weighted_average" => Ok(FusionMethod::WeightedAverage),
        other => bail!("unknown fusion method '{other}'. valid methods: equal_average,weighted_average"),
    }
}

fn parse_pair<T, F>(raw: &str, what: &str, parse: F) -> Result<[T; 2]>
where
    F: Fn(&str) -> Result<T>,
{
    let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let [a, b] = parts.as_slice() else {
        bail!("{what} expects exactly two comma-separated values, got '{raw}'");
    };
    Ok([parse(*a)?, parse(*b)?])
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(resolve_default_config_path);
    let mut cfg = BenchConfig::from_toml_file(&config_path)?;

    if let Some(seed) = cli.seed {
        cfg.seed = seed;
    }
    if let Some(frames) = cli.frames {
        cfg.frames = frames;
    }
    if let Some(raw) = cli.method.as_deref() {
        cfg.method = parse_method(raw)?;
        if cfg.method == FusionMethod::EqualAverage {
            cfg.weights = None;
        }
    }
    if let Some(raw) = cli.strategies.as_deref() {
        cfg.strategies = parse_pair(raw, "--strategies", |s| Ok(s.parse::<TrackerStrategy>()?))?;
    }
    if let Some(raw) = cli.weights.as_deref() {
        cfg.weights = Some(parse_pair(raw, "--weights", |s| Ok(s.parse::<f64>()?))?);
    }
    if cli.parallel {
        cfg.step_mode = StepMode::Parallel;
    }
    cfg.validate()?;

    let run_outdir = create_run_dir(&cli.outdir)?;
    let outcome = run_benchmark(&cfg, &run_outdir)?;

    if let Some(calibration) = outcome.calibration {
        println!(
            "Calibrated weights: w1={:.6} w2={:.6} (held-out errors {:.6}, {:.6})",
            calibration.weights.w1,
            calibration.weights.w2,
            calibration.errors[0],
            calibration.errors[1]
        );
    }
    println!(
        "{} alone: {:.4} | {} alone: {:.4}",
        cfg.strategies[0], outcome.single_errors[0], cfg.strategies[1], outcome.single_errors[1]
    );
    println!("Avg Time: {:?}", outcome.report.mean_latency);
    println!("Avg Error: {:.6}", outcome.report.mean_error);
    println!("wrote outputs to {}", outcome.outdir.display());
    Ok(())
}

use anyhow::{bail, Context, Result};
use csv::{Writer, WriterBuilder};
use dualvo::{FrameRecord, ReportSink, RunReport, VoError};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub method: String,
    pub strategy_a: String,
    pub strategy_b: String,
    pub seed: u64,
    pub frames: usize,
    pub mean_error: f64,
    pub max_error: f64,
    pub mean_latency_us: Option<f64>,
    pub w1: Option<f64>,
    pub w2: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub method: String,
    pub strategies: Vec<String>,
    pub seed: u64,
    pub weights: Option<[f64; 2]>,
    pub calibration_errors: Option<[f64; 2]>,
    pub note: String,
}

fn fmt_f64(v: f64) -> String {
    format!("{v:.10}")
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) => fmt_f64(x),
        None => "NA".to_string(),
    }
}

pub fn ensure_outdir(outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("failed to create output directory: {}", outdir.display()))
}

/// Creates `<base>/<UTC timestamp>[_NNN]` and returns it.
pub fn create_run_dir(base_outdir: &Path) -> Result<PathBuf> {
    ensure_outdir(base_outdir)?;

    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let mut candidate = base_outdir.join(&stamp);
    let mut suffix = 1usize;
    while candidate.exists() {
        if suffix > 999 {
            bail!(
                "failed to allocate unique run output directory under {}",
                base_outdir.display()
            );
        }
        candidate = base_outdir.join(format!("{stamp}_{suffix:03}"));
        suffix += 1;
    }

    ensure_outdir(&candidate)?;
    Ok(candidate)
}

/// Streams one row per scored frame to `trajectory.csv`.
pub struct CsvTrajectorySink {
    wtr: Writer<File>,
}

impl CsvTrajectorySink {
    pub fn create(path: &Path) -> Result<Self> {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| {
                format!(
                    "failed to open trajectory.csv for writing: {}",
                    path.display()
                )
            })?;
        wtr.write_record([
            "frame_id",
            "fused_x",
            "fused_y",
            "fused_z",
            "truth_x",
            "truth_y",
            "truth_z",
            "err_x",
            "err_y",
            "err_z",
            "error",
            "cumulative_error",
            "latency_us",
            "schema_version",
        ])?;
        Ok(Self { wtr })
    }
}

fn sink_err(err: impl std::fmt::Display) -> VoError {
    VoError::Sink(err.to_string())
}

impl ReportSink for CsvTrajectorySink {
    fn record(&mut self, r: &FrameRecord) -> dualvo::Result<()> {
        self.wtr
            .write_record([
                r.frame_id.to_string(),
                fmt_f64(r.fused.x),
                fmt_f64(r.fused.y),
                fmt_f64(r.fused.z),
                fmt_f64(r.truth.x),
                fmt_f64(r.truth.y),
                fmt_f64(r.truth.z),
                fmt_f64(r.abs_error[0]),
                fmt_f64(r.abs_error[1]),
                fmt_f64(r.abs_error[2]),
                fmt_f64(r.error),
                fmt_f64(r.cumulative_error),
                fmt_f64(r.latency.as_secs_f64() * 1e6),
                OUTPUT_SCHEMA_VERSION.to_string(),
            ])
            .map_err(sink_err)
    }

    fn finish(&mut self, _report: &RunReport) -> dualvo::Result<()> {
        self.wtr.flush().map_err(sink_err)
    }
}

pub fn write_summary_csv(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open summary.csv for writing: {}", path.display()))?;

    wtr.write_record([
        "method",
        "strategy_a",
        "strategy_b",
        "seed",
        "frames",
        "mean_error",
        "max_error",
        "mean_latency_us",
        "w1",
        "w2",
        "schema_version",
    ])?;

    for row in rows {
        wtr.write_record([
            row.method.as_str(),
            row.strategy_a.as_str(),
            row.strategy_b.as_str(),
            &row.seed.to_string(),
            &row.frames.to_string(),
            &fmt_f64(row.mean_error),
            &fmt_f64(row.max_error),
            &fmt_opt(row.mean_latency_us),
            &fmt_opt(row.w1),
            &fmt_opt(row.w2),
            OUTPUT_SCHEMA_VERSION,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_manifest_json(outdir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = outdir.join("manifest.json");
    let payload = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(&path, payload)
        .with_context(|| format!("failed to write manifest: {}", path.display()))?;
    Ok(path)
}

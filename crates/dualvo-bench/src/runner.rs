use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dualvo::{
    mean_trajectory_error, EstimatorFactory, EstimatorPair, FrameSource, FusedOdometry,
    FusionMethod, FusionPolicy, FusionWeights, PoseEstimator, RunReport, TrackerConfig, VoError,
};
use log::info;

use crate::config::BenchConfig;
use crate::io::{
    write_manifest_json, write_summary_csv, CsvTrajectorySink, Manifest, SummaryRow,
    OUTPUT_SCHEMA_VERSION,
};
use crate::scene::Scene;
use crate::synthetic::SyntheticFactory;

#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    /// Held-out mean error of each estimator run alone.
    pub errors: [f64; 2],
    pub weights: FusionWeights,
}

#[derive(Debug, Clone)]
pub struct BenchOutcome {
    pub report: RunReport,
    /// Mean error of each estimator alone over the same run.
    pub single_errors: [f64; 2],
    pub weights: Option<FusionWeights>,
    pub calibration: Option<Calibration>,
    pub outdir: PathBuf,
}

pub fn build_factory(cfg: &BenchConfig, seed: u64) -> SyntheticFactory {
    cfg.strategies
        .iter()
        .fold(SyntheticFactory::new(seed), |factory, &strategy| {
            factory.with_profile(strategy, cfg.profile_for(strategy))
        })
}

/// Runs each estimator alone over a held-out scene and derives inverse-error
/// fusion weights from their mean errors.
pub fn calibrate(cfg: &BenchConfig) -> Result<Calibration> {
    let scene = Scene::generate(&cfg.scene, cfg.frames, cfg.calibration_seed)?;
    let factory = build_factory(cfg, cfg.calibration_seed);
    let camera = Arc::new(cfg.camera.clone());

    let mut errors = [0.0; 2];
    for (index, strategy) in cfg.strategies.into_iter().enumerate() {
        let mut estimator = factory.build(
            Arc::clone(&camera),
            scene.truth.clone(),
            TrackerConfig::new(strategy, cfg.num_features),
        )?;
        let mut frames = scene.source(&cfg.camera);
        let mut frame_id = 0;
        while frames.has_more(frame_id) {
            if let Some(image) = frames.image(frame_id) {
                estimator
                    .advance(&image, frame_id)
                    .map_err(|source| VoError::Estimator { index, source })?;
            }
            frame_id += 1;
        }
        errors[index] = mean_trajectory_error(
            estimator.trajectory(),
            estimator.ground_truth_trajectory(),
        )?;
        info!("calibration: {strategy} mean error {:.6}", errors[index]);
    }

    let weights = FusionWeights::from_mean_errors(errors[0], errors[1])?;
    Ok(Calibration { errors, weights })
}

fn max_error<E: PoseEstimator>(estimator: &E) -> f64 {
    estimator
        .trajectory()
        .iter()
        .zip(estimator.ground_truth_trajectory())
        .map(|(e, t)| e.distance(t))
        .fold(0.0, f64::max)
}

pub fn run_benchmark(cfg: &BenchConfig, outdir: &Path) -> Result<BenchOutcome> {
    let (policy, calibration) = match cfg.method {
        FusionMethod::EqualAverage => (FusionPolicy::equal(), None),
        FusionMethod::WeightedAverage => {
            let (weights, calibration) = match cfg.weights {
                Some([w1, w2]) => (FusionWeights::new(w1, w2)?, None),
                None => {
                    let calibration = calibrate(cfg)?;
                    (calibration.weights, Some(calibration))
                }
            };
            (FusionPolicy::weighted(weights.w1, weights.w2)?, calibration)
        }
    };

    let scene = Scene::generate(&cfg.scene, cfg.frames, cfg.seed)?;
    let factory = build_factory(cfg, cfg.seed);
    let [strategy_a, strategy_b] = cfg.strategies;
    let pair = EstimatorPair::new(
        &factory,
        Arc::new(cfg.camera.clone()),
        scene.truth.clone(),
        cfg.num_features,
        TrackerConfig::new(strategy_a, cfg.num_features),
        TrackerConfig::new(strategy_b, cfg.num_features),
    )?
    .with_mode(cfg.step_mode);

    let weights = match cfg.method {
        FusionMethod::EqualAverage => None,
        FusionMethod::WeightedAverage => Some(policy.weights()),
    };
    let mut odometry = FusedOdometry::new(pair, policy, cfg.odometry_options());

    let mut sink = CsvTrajectorySink::create(&outdir.join("trajectory.csv"))?;
    let mut source = scene.source(&cfg.camera);
    let report = odometry
        .run(&mut source, &mut sink)
        .context("fused odometry run failed")?;

    let method = match cfg.method {
        FusionMethod::EqualAverage => "equal_average",
        FusionMethod::WeightedAverage => "weighted_average",
    };
    let mut rows = vec![SummaryRow {
        method: method.to_string(),
        strategy_a: strategy_a.to_string(),
        strategy_b: strategy_b.to_string(),
        seed: cfg.seed,
        frames: report.frames,
        mean_error: report.mean_error,
        max_error: report.max_error,
        mean_latency_us: Some(report.mean_latency.as_secs_f64() * 1e6),
        w1: weights.map(|w| w.w1),
        w2: weights.map(|w| w.w2),
    }];

    let mut single_errors = [0.0; 2];
    for (index, strategy) in cfg.strategies.into_iter().enumerate() {
        let estimator = odometry
            .pair()
            .estimator(index)
            .context("estimator pair lost an estimator")?;
        single_errors[index] = mean_trajectory_error(
            estimator.trajectory(),
            estimator.ground_truth_trajectory(),
        )?;
        rows.push(SummaryRow {
            method: "single".to_string(),
            strategy_a: strategy.to_string(),
            strategy_b: "NA".to_string(),
            seed: cfg.seed,
            frames: estimator.trajectory().len(),
            mean_error: single_errors[index],
            max_error: max_error(estimator),
            mean_latency_us: None,
            w1: None,
            w2: None,
        });
    }

    write_summary_csv(&outdir.join("summary.csv"), &rows)?;
    write_manifest_json(
        outdir,
        &Manifest {
            schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
            method: method.to_string(),
            strategies: cfg.strategies.iter().map(|s| s.to_string()).collect(),
            seed: cfg.seed,
            weights: weights.map(|w| [w.w1, w.w2]),
            calibration_errors: calibration.map(|c| c.errors),
            note: "Deterministic synthetic dual-VO fusion benchmark".to_string(),
        },
    )?;

    Ok(BenchOutcome {
        report,
        single_errors,
        weights,
        calibration,
        outdir: outdir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use dualvo::StepMode;

    #[test]
    fn test_calibration_weights_are_inverse_errors() {
        let cfg = test_config();
        let calibration = calibrate(&cfg).unwrap();
        assert!(calibration.errors.iter().all(|e| *e > 0.0));
        approx::assert_relative_eq!(calibration.weights.w1 * calibration.errors[0], 1.0, epsilon = 1e-12);
        approx::assert_relative_eq!(calibration.weights.w2 * calibration.errors[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_benchmark_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config();
        let outcome = run_benchmark(&cfg, dir.path()).unwrap();

        assert_eq!(outcome.report.frames, cfg.frames - cfg.warmup_frames);
        assert!(outcome.calibration.is_some());
        for name in ["trajectory.csv", "summary.csv", "manifest.json"] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
        let summary = std::fs::read_to_string(dir.path().join("summary.csv")).unwrap();
        assert_eq!(summary.lines().count(), 4);
    }

    #[test]
    fn test_runs_are_reproducible_across_step_modes() {
        let mut cfg = test_config();
        cfg.weights = Some([2.0, 1.0]);
        let seq_dir = tempfile::tempdir().unwrap();
        let par_dir = tempfile::tempdir().unwrap();
        let seq = run_benchmark(&cfg, seq_dir.path()).unwrap();
        cfg.step_mode = StepMode::Parallel;
        let par = run_benchmark(&cfg, par_dir.path()).unwrap();

        assert_eq!(seq.report.mean_error, par.report.mean_error);
        assert_eq!(seq.single_errors, par.single_errors);
        assert!(seq.calibration.is_none());
    }

    #[test]
    fn test_equal_average_has_no_weights() {
        let mut cfg = test_config();
        cfg.method = FusionMethod::EqualAverage;
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_benchmark(&cfg, dir.path()).unwrap();
        assert!(outcome.weights.is_none());
        assert!(outcome.calibration.is_none());
    }
}

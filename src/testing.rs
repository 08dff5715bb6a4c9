//! Scripted estimators for unit tests.

use std::sync::Arc;

use crate::camera::CameraModel;
use crate::error::{EstimatorFailure, Result};
use crate::estimator::{EstimatorFactory, PoseEstimator};
use crate::ground_truth::{GroundTruthOracle, TrajectoryGroundTruth};
use crate::image::GrayImage;
use crate::pose::Pose3D;
use crate::tracker::{TrackerConfig, TrackerStrategy};

pub type Script = fn(usize) -> Pose3D;

pub fn camera() -> CameraModel {
    CameraModel::new(8, 6, 7.0, 7.0, 4.0, 3.0, 10.0)
}

pub fn frame() -> GrayImage {
    GrayImage::filled(8, 6, 128)
}

/// Ground truth `(i/2, i/2, 0)` for frame `i`.
pub fn diagonal_ground_truth(frames: usize) -> TrajectoryGroundTruth {
    (0..frames)
        .map(|i| Pose3D::new(i as f64 / 2.0, i as f64 / 2.0, 0.0))
        .collect()
}

pub struct ScriptedEstimator {
    pub config: TrackerConfig,
    script: Script,
    fail_on: Option<usize>,
    ground_truth: Arc<dyn GroundTruthOracle>,
    trajectory: Vec<Pose3D>,
    gt_trajectory: Vec<Pose3D>,
}

impl PoseEstimator for ScriptedEstimator {
    fn strategy(&self) -> TrackerStrategy {
        self.config.strategy
    }

    fn advance(
        &mut self,
        _image: &GrayImage,
        frame_id: usize,
    ) -> std::result::Result<(), EstimatorFailure> {
        if self.fail_on == Some(frame_id) {
            return Err(format!("no matches on frame {frame_id}").into());
        }
        let truth = self
            .ground_truth
            .position(frame_id)
            .ok_or_else(|| format!("no ground truth for frame {frame_id}"))?;
        self.trajectory.push((self.script)(frame_id));
        self.gt_trajectory.push(truth);
        Ok(())
    }

    fn trajectory(&self) -> &[Pose3D] {
        &self.trajectory
    }

    fn ground_truth_trajectory(&self) -> &[Pose3D] {
        &self.gt_trajectory
    }
}

pub struct ScriptedFactory {
    scripts: Vec<(TrackerStrategy, Script)>,
    failure: Option<(TrackerStrategy, usize)>,
}

impl ScriptedFactory {
    /// BRISK and ORB report `(i, 0, 0)`; LK_FAST and SIFT report `(0, i, 0)`.
    pub fn axis_aligned() -> Self {
        let x_axis: Script = |i| Pose3D::new(i as f64, 0.0, 0.0);
        let y_axis: Script = |i| Pose3D::new(0.0, i as f64, 0.0);
        Self {
            scripts: vec![
                (TrackerStrategy::Brisk, x_axis),
                (TrackerStrategy::Orb, x_axis),
                (TrackerStrategy::LkFast, y_axis),
                (TrackerStrategy::Sift, y_axis),
            ],
            failure: None,
        }
    }

    pub fn failing_on(mut self, strategy: TrackerStrategy, frame_id: usize) -> Self {
        self.failure = Some((strategy, frame_id));
        self
    }
}

impl EstimatorFactory for ScriptedFactory {
    type Estimator = ScriptedEstimator;

    fn build(
        &self,
        _camera: Arc<CameraModel>,
        ground_truth: Arc<dyn GroundTruthOracle>,
        config: TrackerConfig,
    ) -> Result<ScriptedEstimator> {
        let script = self
            .scripts
            .iter()
            .find(|(s, _)| *s == config.strategy)
            .map(|(_, f)| *f)
            .unwrap_or(|_| Pose3D::ORIGIN);
        let fail_on = self
            .failure
            .filter(|(s, _)| *s == config.strategy)
            .map(|(_, id)| id);
        Ok(ScriptedEstimator {
            config,
            script,
            fail_on,
            ground_truth,
            trajectory: Vec::new(),
            gt_trajectory: Vec::new(),
        })
    }
}

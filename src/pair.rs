//! Two independently configured pose estimators driven in lock-step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::error::{Result, VoError};
use crate::estimator::{EstimatorFactory, PoseEstimator};
use crate::ground_truth::GroundTruthOracle;
use crate::image::GrayImage;
use crate::pose::Pose3D;
use crate::tracker::TrackerConfig;

/// How the two estimator advances inside a step are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    #[default]
    Sequential,
    /// Advance both estimators on the rayon pool and join before returning.
    Parallel,
}

pub struct EstimatorPair<E: PoseEstimator> {
    camera: Arc<CameraModel>,
    ground_truth: Arc<dyn GroundTruthOracle>,
    configs: [TrackerConfig; 2],
    estimators: [E; 2],
    latencies: Vec<Duration>,
    last_frame_id: Option<usize>,
    mode: StepMode,
}

impl<E: PoseEstimator> EstimatorPair<E> {
    /// Builds one estimator per config, both bound to the same camera, ground
    /// truth and target feature count. The two configs must name different
    /// tracking strategies.
    pub fn new<F>(
        factory: &F,
        camera: Arc<CameraModel>,
        ground_truth: Arc<dyn GroundTruthOracle>,
        num_features: usize,
        config_a: TrackerConfig,
        config_b: TrackerConfig,
    ) -> Result<Self>
    where
        F: EstimatorFactory<Estimator = E> + ?Sized,
    {
        camera.validate()?;
        if config_a.same_strategy(&config_b) {
            return Err(VoError::config(format!(
                "both estimators use {}; two different tracker strategies are required",
                config_a.strategy
            )));
        }

        let configs = [config_a, config_b].map(|mut cfg| {
            cfg.num_features = num_features;
            cfg
        });
        for cfg in &configs {
            cfg.validate()?;
        }

        let first = factory.build(Arc::clone(&camera), Arc::clone(&ground_truth), configs[0])?;
        let second = factory.build(Arc::clone(&camera), Arc::clone(&ground_truth), configs[1])?;

        info!(
            "estimator pair ready: {} + {} ({} features)",
            configs[0].strategy, configs[1].strategy, num_features
        );

        Ok(Self {
            camera,
            ground_truth,
            configs,
            estimators: [first, second],
            latencies: Vec::new(),
            last_frame_id: None,
            mode: StepMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: StepMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    /// Feeds `image` to both estimators and records the wall-clock duration of
    /// the joint step. Nothing is recorded when the step fails. Once one
    /// estimator has failed alone the pair is desynchronized and every later
    /// step is refused before either estimator is touched.
    pub fn step(&mut self, image: Option<&GrayImage>, frame_id: usize) -> Result<Duration> {
        self.check_synchronized()?;
        let image = image.ok_or_else(|| VoError::frame(frame_id, "no image"))?;
        if !image.is_readable() {
            return Err(VoError::frame(frame_id, "unreadable image buffer"));
        }
        if !image.matches_camera(&self.camera) {
            return Err(VoError::frame(
                frame_id,
                format!(
                    "image is {}x{}, camera expects {}x{}",
                    image.width, image.height, self.camera.width, self.camera.height
                ),
            ));
        }
        if let Some(last) = self.last_frame_id {
            if frame_id <= last {
                return Err(VoError::frame(
                    frame_id,
                    format!("frame ids must increase (last processed {last})"),
                ));
            }
        }

        let t0 = Instant::now();
        match self.mode {
            StepMode::Sequential => {
                for (index, estimator) in self.estimators.iter_mut().enumerate() {
                    estimator
                        .advance(image, frame_id)
                        .map_err(|source| VoError::Estimator { index, source })?;
                }
            }
            StepMode::Parallel => {
                let [first, second] = &mut self.estimators;
                let (res_a, res_b) = rayon::join(
                    || first.advance(image, frame_id),
                    || second.advance(image, frame_id),
                );
                res_a.map_err(|source| VoError::Estimator { index: 0, source })?;
                res_b.map_err(|source| VoError::Estimator { index: 1, source })?;
            }
        }
        let elapsed = t0.elapsed();

        self.latencies.push(elapsed);
        self.last_frame_id = Some(frame_id);
        debug!("frame {frame_id}: joint step took {elapsed:?}");
        Ok(elapsed)
    }

    /// Most recent position of estimator `index` (0 or 1).
    pub fn latest_estimate(&self, index: usize) -> Result<Pose3D> {
        let estimator = self
            .estimators
            .get(index)
            .ok_or_else(|| VoError::config(format!("estimator index {index} out of range")))?;
        estimator
            .latest_position()
            .ok_or(VoError::NotReady("no frame has been processed yet"))
    }

    /// Both latest positions, checked to belong to the same frame.
    pub fn latest_estimates(&self) -> Result<(Pose3D, Pose3D)> {
        self.check_synchronized()?;
        Ok((self.latest_estimate(0)?, self.latest_estimate(1)?))
    }

    fn check_synchronized(&self) -> Result<()> {
        let (len_a, len_b) = (
            self.estimators[0].trajectory().len(),
            self.estimators[1].trajectory().len(),
        );
        if len_a != len_b {
            return Err(VoError::Desynchronized {
                first: len_a,
                second: len_b,
            });
        }
        Ok(())
    }

    /// Both estimators share the oracle, so the first one's log is used.
    pub fn latest_ground_truth(&self) -> Result<Pose3D> {
        self.estimators[0]
            .latest_ground_truth_position()
            .ok_or(VoError::NotReady("no frame has been processed yet"))
    }

    pub fn estimator(&self, index: usize) -> Option<&E> {
        self.estimators.get(index)
    }

    pub fn configs(&self) -> &[TrackerConfig; 2] {
        &self.configs
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn ground_truth(&self) -> &dyn GroundTruthOracle {
        self.ground_truth.as_ref()
    }

    /// Duration of every successful step, in processing order.
    pub fn latencies(&self) -> &[Duration] {
        &self.latencies
    }

    pub fn last_latency(&self) -> Option<Duration> {
        self.latencies.last().copied()
    }

    pub fn processed_frames(&self) -> usize {
        self.latencies.len()
    }

    pub fn last_frame_id(&self) -> Option<usize> {
        self.last_frame_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{camera, diagonal_ground_truth, frame, ScriptedFactory};
    use crate::tracker::TrackerStrategy;

    fn pair(factory: &ScriptedFactory) -> EstimatorPair<crate::testing::ScriptedEstimator> {
        EstimatorPair::new(
            factory,
            Arc::new(camera()),
            Arc::new(diagonal_ground_truth(10)),
            2000,
            TrackerStrategy::Brisk.into(),
            TrackerStrategy::LkFast.into(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_identical_strategies() {
        let factory = ScriptedFactory::axis_aligned();
        let result = EstimatorPair::new(
            &factory,
            Arc::new(camera()),
            Arc::new(diagonal_ground_truth(10)),
            2000,
            TrackerStrategy::Orb.into(),
            TrackerStrategy::Orb.into(),
        );
        assert!(matches!(result, Err(VoError::Configuration(_))));
    }

    #[test]
    fn test_feature_count_applies_to_both() {
        let factory = ScriptedFactory::axis_aligned();
        let pair = EstimatorPair::new(
            &factory,
            Arc::new(camera()),
            Arc::new(diagonal_ground_truth(10)),
            500,
            TrackerConfig::new(TrackerStrategy::Orb, 100),
            TrackerConfig::new(TrackerStrategy::Sift, 9000),
        )
        .unwrap();
        assert!(pair.configs().iter().all(|c| c.num_features == 500));
        assert_eq!(pair.estimator(1).unwrap().config.num_features, 500);
    }

    #[test]
    fn test_not_ready_before_first_step() {
        let factory = ScriptedFactory::axis_aligned();
        let pair = pair(&factory);
        assert!(matches!(pair.latest_estimate(0), Err(VoError::NotReady(_))));
        assert!(matches!(pair.latest_ground_truth(), Err(VoError::NotReady(_))));
    }

    #[test]
    fn test_step_advances_both_and_logs_latency() {
        let factory = ScriptedFactory::axis_aligned();
        let mut pair = pair(&factory);
        let img = frame();

        pair.step(Some(&img), 0).unwrap();
        pair.step(Some(&img), 1).unwrap();

        assert_eq!(pair.processed_frames(), 2);
        assert_eq!(pair.estimator(0).unwrap().trajectory().len(), 2);
        assert_eq!(pair.estimator(1).unwrap().trajectory().len(), 2);
        assert_eq!(pair.latest_estimate(0).unwrap(), Pose3D::new(1.0, 0.0, 0.0));
        assert_eq!(pair.latest_estimate(1).unwrap(), Pose3D::new(0.0, 1.0, 0.0));
        assert_eq!(pair.latest_ground_truth().unwrap(), Pose3D::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn test_missing_frame_leaves_state_untouched() {
        let factory = ScriptedFactory::axis_aligned();
        let mut pair = pair(&factory);
        pair.step(Some(&frame()), 0).unwrap();

        let err = pair.step(None, 1).unwrap_err();
        assert!(matches!(err, VoError::Frame { frame_id: 1, .. }));
        assert_eq!(pair.processed_frames(), 1);
        assert_eq!(pair.estimator(0).unwrap().trajectory().len(), 1);
        assert_eq!(pair.estimator(1).unwrap().trajectory().len(), 1);

        // skipping an id is fine
        pair.step(Some(&frame()), 2).unwrap();
        assert_eq!(pair.latest_estimate(0).unwrap(), Pose3D::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_unreadable_and_mismatched_frames_rejected() {
        let factory = ScriptedFactory::axis_aligned();
        let mut pair = pair(&factory);
        let truncated = GrayImage::new(8, 6, vec![0; 10]);
        let wrong_size = GrayImage::filled(4, 4, 0);

        assert!(matches!(pair.step(Some(&truncated), 0), Err(VoError::Frame { .. })));
        assert!(matches!(pair.step(Some(&wrong_size), 0), Err(VoError::Frame { .. })));
        assert_eq!(pair.processed_frames(), 0);
    }

    #[test]
    fn test_non_increasing_frame_id_rejected() {
        let factory = ScriptedFactory::axis_aligned();
        let mut pair = pair(&factory);
        pair.step(Some(&frame()), 3).unwrap();
        assert!(matches!(pair.step(Some(&frame()), 3), Err(VoError::Frame { .. })));
        assert!(matches!(pair.step(Some(&frame()), 1), Err(VoError::Frame { .. })));
    }

    #[test]
    fn test_parallel_mode_matches_sequential() {
        let factory = ScriptedFactory::axis_aligned();
        let mut seq = pair(&factory);
        let mut par = pair(&factory).with_mode(StepMode::Parallel);
        for id in 0..4 {
            seq.step(Some(&frame()), id).unwrap();
            par.step(Some(&frame()), id).unwrap();
        }
        assert_eq!(seq.latest_estimates().unwrap(), par.latest_estimates().unwrap());
        assert_eq!(par.latencies().len(), 4);
    }

    #[test]
    fn test_estimator_failure_surfaces_with_index() {
        let factory = ScriptedFactory::axis_aligned().failing_on(TrackerStrategy::LkFast, 2);
        let mut pair = pair(&factory);
        pair.step(Some(&frame()), 1).unwrap();
        let err = pair.step(Some(&frame()), 2).unwrap_err();
        assert!(matches!(err, VoError::Estimator { index: 1, .. }));
        assert_eq!(pair.processed_frames(), 1);
        assert!(matches!(
            pair.latest_estimates(),
            Err(VoError::Desynchronized { first: 2, second: 1 })
        ));
    }

    #[test]
    fn test_desynchronized_pair_refuses_further_steps() {
        let factory = ScriptedFactory::axis_aligned().failing_on(TrackerStrategy::LkFast, 2);
        let mut pair = pair(&factory);
        pair.step(Some(&frame()), 1).unwrap();
        assert!(pair.step(Some(&frame()), 2).is_err());

        for id in 3..6 {
            let err = pair.step(Some(&frame()), id).unwrap_err();
            assert!(matches!(err, VoError::Desynchronized { first: 2, second: 1 }));
        }
        assert_eq!(pair.estimator(0).unwrap().trajectory().len(), 2);
        assert_eq!(pair.estimator(1).unwrap().trajectory().len(), 1);
        assert_eq!(pair.processed_frames(), 1);
        assert_eq!(pair.last_frame_id(), Some(1));
    }

    #[test]
    fn test_parallel_failure_reports_index_and_desynchronizes() {
        let factory = ScriptedFactory::axis_aligned().failing_on(TrackerStrategy::Brisk, 1);
        let mut pair = pair(&factory).with_mode(StepMode::Parallel);
        pair.step(Some(&frame()), 0).unwrap();

        let err = pair.step(Some(&frame()), 1).unwrap_err();
        assert!(matches!(err, VoError::Estimator { index: 0, .. }));
        assert!(matches!(
            pair.step(Some(&frame()), 2),
            Err(VoError::Desynchronized { first: 1, second: 2 })
        ));
        assert_eq!(pair.latencies().len(), 1);
    }

    #[test]
    fn test_latest_estimate_is_idempotent() {
        let factory = ScriptedFactory::axis_aligned();
        let mut pair = pair(&factory);
        pair.step(Some(&frame()), 4).unwrap();
        let first = pair.latest_estimate(1).unwrap();
        assert_eq!(first, pair.latest_estimate(1).unwrap());
        assert!(pair.latest_estimate(2).is_err());
    }
}

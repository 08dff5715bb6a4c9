//! Stand-in monocular VO pipeline for benchmarking the fusion core.
//!
//! Each advance recovers the inter-frame translation direction with a
//! strategy-dependent heading error, then rescales it by the absolute scale
//! taken from ground truth. Heading error accumulates, so trajectories drift
//! the way real monocular VO does.
//!
//! Tracking quality comes from the camera: every frame a fresh set of
//! `num_features` landmarks is scattered over the image, pushed through the
//! inter-frame translation, and re-projected. Landmarks that leave the image
//! are lost, the ratio test thins the rest, and the surviving match count sets
//! the noise gain.

use std::sync::Arc;

use anyhow::{ensure, Result};
use dualvo::error::EstimatorFailure;
use dualvo::tracker::{Matcher, TrackerKind};
use dualvo::{
    CameraModel, EstimatorFactory, GrayImage, GroundTruthOracle, Pose3D, PoseEstimator,
    TrackerConfig, TrackerStrategy,
};
use log::debug;
use nalgebra::{Rotation3, Vector2, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Error model of one tracking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// Per-frame heading noise std [rad]
    pub heading_noise: f64,
    /// Per-frame heading drift [rad]
    pub heading_bias: f64,
    /// Relative scale noise std
    pub scale_noise: f64,
    /// Noise multiplier on low-texture frames
    pub low_texture_gain: f64,
}

impl NoiseProfile {
    pub fn for_strategy(strategy: TrackerStrategy) -> Self {
        match (strategy.kind(), strategy.matcher()) {
            (TrackerKind::LucasKanade, _) => Self {
                heading_noise: 0.004,
                heading_bias: 0.0003,
                scale_noise: 0.02,
                low_texture_gain: 2.0,
            },
            (TrackerKind::DescriptorMatching, Matcher::Flann) => Self {
                heading_noise: 0.0025,
                heading_bias: -0.0002,
                scale_noise: 0.012,
                low_texture_gain: 6.0,
            },
            (TrackerKind::DescriptorMatching, _) => Self {
                heading_noise: 0.003,
                heading_bias: -0.00025,
                scale_noise: 0.015,
                low_texture_gain: 8.0,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.heading_noise >= 0.0, "heading_noise must be >= 0");
        ensure!(self.scale_noise >= 0.0, "scale_noise must be >= 0");
        ensure!(self.heading_bias.is_finite(), "heading_bias must be finite");
        ensure!(self.low_texture_gain >= 1.0, "low_texture_gain must be >= 1");
        Ok(())
    }
}

/// Pixel intensity standard deviation below which a frame counts as textureless.
const MIN_TEXTURE_STD: f64 = 2.0;

/// Below this many matches the relative pose is unrecoverable.
const MIN_MATCHES: f64 = 8.0;

/// Match count at which the noise profile applies unscaled.
const NOMINAL_MATCHES: f64 = 1000.0;

/// Landmark depth range [m].
const MIN_DEPTH: f64 = 2.0;
const MAX_DEPTH: f64 = 40.0;

fn intensity_std(image: &GrayImage) -> f64 {
    let n = image.data.len() as f64;
    let mean = image.data.iter().map(|&p| p as f64).sum::<f64>() / n;
    let var = image
        .data
        .iter()
        .map(|&p| (p as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    var.sqrt()
}

pub struct SyntheticEstimator {
    config: TrackerConfig,
    camera: Arc<CameraModel>,
    profile: NoiseProfile,
    ground_truth: Arc<dyn GroundTruthOracle>,
    rng: ChaCha8Rng,
    heading_error: f64,
    last_frame_id: Option<usize>,
    trajectory: Vec<Pose3D>,
    gt_trajectory: Vec<Pose3D>,
}

impl SyntheticEstimator {
    pub fn new(
        config: TrackerConfig,
        camera: Arc<CameraModel>,
        profile: NoiseProfile,
        ground_truth: Arc<dyn GroundTruthOracle>,
        seed: u64,
    ) -> Self {
        Self {
            config,
            camera,
            profile,
            ground_truth,
            rng: ChaCha8Rng::seed_from_u64(seed),
            heading_error: 0.0,
            last_frame_id: None,
            trajectory: Vec::new(),
            gt_trajectory: Vec::new(),
        }
    }

    /// Matches that survive a camera translation of `motion` and the ratio
    /// test. The camera looks down +z and is not rotated between frames.
    fn tracked_matches(&mut self, motion: &Vector3<f64>) -> f64 {
        let max_u = (self.camera.width as f64 - 0.5).max(0.5);
        let max_v = (self.camera.height as f64 - 0.5).max(0.5);
        let mut visible = 0_usize;
        for _ in 0..self.config.num_features {
            let uv = Vector2::new(
                self.rng.gen_range(0.5..=max_u),
                self.rng.gen_range(0.5..=max_v),
            );
            let depth = self.rng.gen_range(MIN_DEPTH..MAX_DEPTH);
            let landmark = self.camera.unproject(&uv) * depth - motion;
            if self
                .camera
                .project(&landmark)
                .is_some_and(|px| self.camera.contains(&px))
            {
                visible += 1;
            }
        }
        visible as f64 * self.config.ratio_test
    }

    fn sample(&mut self, std: f64) -> std::result::Result<f64, EstimatorFailure> {
        if std <= 0.0 {
            return Ok(0.0);
        }
        Ok(Normal::new(0.0, std)?.sample(&mut self.rng))
    }
}

impl PoseEstimator for SyntheticEstimator {
    fn strategy(&self) -> TrackerStrategy {
        self.config.strategy
    }

    fn advance(
        &mut self,
        image: &GrayImage,
        frame_id: usize,
    ) -> std::result::Result<(), EstimatorFailure> {
        let truth = self
            .ground_truth
            .position(frame_id)
            .ok_or_else(|| format!("no ground truth for frame {frame_id}"))?;

        let Some((last_id, last_est)) = self.last_frame_id.zip(self.trajectory.last().copied())
        else {
            self.trajectory.push(truth);
            self.gt_trajectory.push(truth);
            self.last_frame_id = Some(frame_id);
            return Ok(());
        };

        let prev_truth = self
            .ground_truth
            .position(last_id)
            .ok_or_else(|| format!("no ground truth for frame {last_id}"))?;
        let delta = truth.to_vector() - prev_truth.to_vector();
        let scale = delta.norm();

        let matches = self.tracked_matches(&delta);
        if matches < MIN_MATCHES {
            return Err(format!(
                "{}: only {matches:.0} matches on frame {frame_id}",
                self.config.strategy
            )
            .into());
        }

        // Fewer matches give noisier geometry.
        let mut gain = (NOMINAL_MATCHES / matches).sqrt();
        if intensity_std(image) < MIN_TEXTURE_STD {
            gain *= self.profile.low_texture_gain;
        }
        let frames_elapsed = frame_id.saturating_sub(last_id) as f64;
        let heading_noise = self.sample(self.profile.heading_noise * gain)?;
        self.heading_error += self.profile.heading_bias * frames_elapsed + heading_noise;
        let scale_error = 1.0 + self.sample(self.profile.scale_noise * gain)?;

        let step = if scale > f64::EPSILON {
            let rot = Rotation3::from_axis_angle(&Vector3::y_axis(), self.heading_error);
            rot * (delta / scale) * (scale * scale_error)
        } else {
            Vector3::zeros()
        };
        let est: Pose3D = (last_est.to_vector() + step).into();

        debug!(
            "{} frame {frame_id}: {matches:.0} matches, heading error {:.5} rad, gain {:.2}",
            self.config.strategy, self.heading_error, gain
        );

        self.trajectory.push(est);
        self.gt_trajectory.push(truth);
        self.last_frame_id = Some(frame_id);
        Ok(())
    }

    fn trajectory(&self) -> &[Pose3D] {
        &self.trajectory
    }

    fn ground_truth_trajectory(&self) -> &[Pose3D] {
        &self.gt_trajectory
    }
}

/// Maps each strategy to a [`SyntheticEstimator`] with its noise profile.
pub struct SyntheticFactory {
    seed: u64,
    profiles: Vec<(TrackerStrategy, NoiseProfile)>,
}

impl SyntheticFactory {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            profiles: Vec::new(),
        }
    }

    pub fn with_profile(mut self, strategy: TrackerStrategy, profile: NoiseProfile) -> Self {
        self.profiles.retain(|(s, _)| *s != strategy);
        self.profiles.push((strategy, profile));
        self
    }

    pub fn profile(&self, strategy: TrackerStrategy) -> NoiseProfile {
        self.profiles
            .iter()
            .find(|(s, _)| *s == strategy)
            .map(|(_, p)| *p)
            .unwrap_or_else(|| NoiseProfile::for_strategy(strategy))
    }

    fn stream_seed(&self, strategy: TrackerStrategy) -> u64 {
        let index = TrackerStrategy::ALL
            .iter()
            .position(|s| *s == strategy)
            .unwrap_or_default() as u64;
        self.seed ^ (index + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

impl EstimatorFactory for SyntheticFactory {
    type Estimator = SyntheticEstimator;

    fn build(
        &self,
        camera: Arc<CameraModel>,
        ground_truth: Arc<dyn GroundTruthOracle>,
        config: TrackerConfig,
    ) -> dualvo::Result<SyntheticEstimator> {
        config.validate()?;
        Ok(SyntheticEstimator::new(
            config,
            camera,
            self.profile(config.strategy),
            ground_truth,
            self.stream_seed(config.strategy),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualvo::TrajectoryGroundTruth;

    fn straight_line(n: usize) -> Arc<TrajectoryGroundTruth> {
        Arc::new((0..n).map(|i| Pose3D::new(0.0, 0.0, i as f64)).collect())
    }

    fn camera() -> Arc<CameraModel> {
        Arc::new(CameraModel::new(24, 12, 14.0, 14.0, 12.0, 6.0, 10.0))
    }

    fn textured() -> GrayImage {
        GrayImage::new(4, 2, vec![0, 50, 100, 150, 200, 250, 30, 90])
    }

    #[test]
    fn test_noiseless_profile_tracks_truth() {
        let profile = NoiseProfile {
            heading_noise: 0.0,
            heading_bias: 0.0,
            scale_noise: 0.0,
            low_texture_gain: 1.0,
        };
        let gt = straight_line(10);
        let mut est = SyntheticEstimator::new(
            TrackerConfig::new(TrackerStrategy::Orb, 2000),
            camera(),
            profile,
            gt.clone(),
            1,
        );
        for id in [0, 1, 2, 5, 9] {
            est.advance(&textured(), id).unwrap();
        }
        for (e, t) in est.trajectory().iter().zip(est.ground_truth_trajectory()) {
            assert!(e.distance(t) < 1e-9);
        }
        assert_eq!(est.trajectory().len(), 5);
    }

    #[test]
    fn test_heading_bias_drifts_away_from_truth() {
        let profile = NoiseProfile {
            heading_noise: 0.0,
            heading_bias: 0.01,
            scale_noise: 0.0,
            low_texture_gain: 1.0,
        };
        let mut est = SyntheticEstimator::new(
            TrackerConfig::new(TrackerStrategy::LkFast, 2000),
            camera(),
            profile,
            straight_line(30),
            1,
        );
        for id in 0..30 {
            est.advance(&textured(), id).unwrap();
        }
        let last = est.latest_position().unwrap();
        assert!(last.distance(&est.latest_ground_truth_position().unwrap()) > 1.0);
    }

    #[test]
    fn test_missing_ground_truth_is_an_estimator_failure() {
        let mut est = SyntheticEstimator::new(
            TrackerConfig::new(TrackerStrategy::Orb, 2000),
            camera(),
            NoiseProfile::for_strategy(TrackerStrategy::Orb),
            straight_line(2),
            1,
        );
        assert!(est.advance(&textured(), 5).is_err());
        assert!(est.trajectory().is_empty());
    }

    fn lk_estimator(num_features: usize) -> SyntheticEstimator {
        SyntheticEstimator::new(
            TrackerConfig::new(TrackerStrategy::LkFast, num_features),
            camera(),
            NoiseProfile::for_strategy(TrackerStrategy::LkFast),
            straight_line(10),
            9,
        )
    }

    #[test]
    fn test_static_camera_keeps_every_landmark() {
        let mut est = lk_estimator(500);
        assert_eq!(est.tracked_matches(&Vector3::zeros()), 500.0);
    }

    #[test]
    fn test_large_motion_loses_landmarks() {
        let mut est = lk_estimator(500);
        let forward = est.tracked_matches(&Vector3::new(0.0, 0.0, 30.0));
        let sideways = est.tracked_matches(&Vector3::new(25.0, 0.0, 0.0));
        assert!(forward < 500.0);
        assert!(sideways < 500.0);
    }

    #[test]
    fn test_ratio_test_thins_matches() {
        let mut est = SyntheticEstimator::new(
            TrackerConfig::new(TrackerStrategy::Orb, 500).with_ratio_test(0.5),
            camera(),
            NoiseProfile::for_strategy(TrackerStrategy::Orb),
            straight_line(10),
            9,
        );
        assert_eq!(est.tracked_matches(&Vector3::zeros()), 250.0);
    }

    #[test]
    fn test_too_few_features_fail_to_track() {
        let mut est = SyntheticEstimator::new(
            TrackerConfig::new(TrackerStrategy::Orb, 10),
            camera(),
            NoiseProfile::for_strategy(TrackerStrategy::Orb),
            straight_line(10),
            1,
        );
        est.advance(&textured(), 0).unwrap();
        let err = est.advance(&textured(), 1).unwrap_err();
        assert!(err.to_string().contains("matches"));
        assert_eq!(est.trajectory().len(), 1);
    }

    #[test]
    fn test_factory_uses_pair_camera() {
        let factory = SyntheticFactory::new(4);
        let config = TrackerConfig::new(TrackerStrategy::LkFast, 50);
        let telephoto = Arc::new(CameraModel::new(2, 2, 100.0, 100.0, 1.0, 1.0, 10.0));
        let mut narrow = factory.build(telephoto, straight_line(4), config).unwrap();
        let mut wide = factory.build(camera(), straight_line(4), config).unwrap();

        let lateral = Vector3::new(1.0, 0.0, 0.0);
        assert_eq!(narrow.tracked_matches(&lateral), 0.0);
        assert!(wide.tracked_matches(&lateral) > 0.0);
    }

    #[test]
    fn test_factory_streams_differ_per_strategy() {
        let factory = SyntheticFactory::new(42);
        assert_ne!(
            factory.stream_seed(TrackerStrategy::Orb),
            factory.stream_seed(TrackerStrategy::Brisk)
        );
        let custom = NoiseProfile {
            low_texture_gain: 1.0,
            ..NoiseProfile::for_strategy(TrackerStrategy::Orb)
        };
        let factory = factory.with_profile(TrackerStrategy::Orb, custom);
        assert_eq!(factory.profile(TrackerStrategy::Orb), custom);
    }
}

//! Seam to the external single-pipeline pose estimator.
//!
//! The monocular VO pipeline itself (feature tracking, essential-matrix pose
//! recovery, absolute scale from ground truth) lives outside this crate. The
//! core only drives it through [`PoseEstimator`] and builds instances through
//! an [`EstimatorFactory`].

use std::sync::Arc;

use crate::camera::CameraModel;
use crate::error::{EstimatorFailure, Result};
use crate::ground_truth::GroundTruthOracle;
use crate::image::GrayImage;
use crate::pose::Pose3D;
use crate::tracker::{TrackerConfig, TrackerStrategy};

pub trait PoseEstimator: Send {
    fn strategy(&self) -> TrackerStrategy;

    /// Consumes one frame and appends one entry to both trajectory logs.
    /// Frame ids passed here are strictly increasing.
    fn advance(&mut self, image: &GrayImage, frame_id: usize)
        -> std::result::Result<(), EstimatorFailure>;

    /// Estimated positions, one per successful `advance`.
    fn trajectory(&self) -> &[Pose3D];

    /// Ground-truth positions recorded alongside `trajectory`.
    fn ground_truth_trajectory(&self) -> &[Pose3D];

    fn latest_position(&self) -> Option<Pose3D> {
        self.trajectory().last().copied()
    }

    fn latest_ground_truth_position(&self) -> Option<Pose3D> {
        self.ground_truth_trajectory().last().copied()
    }
}

/// Resolves a tracker configuration into a concrete estimator.
pub trait EstimatorFactory {
    type Estimator: PoseEstimator;

    fn build(
        &self,
        camera: Arc<CameraModel>,
        ground_truth: Arc<dyn GroundTruthOracle>,
        config: TrackerConfig,
    ) -> Result<Self::Estimator>;
}

impl<F: EstimatorFactory + ?Sized> EstimatorFactory for &F {
    type Estimator = F::Estimator;

    fn build(
        &self,
        camera: Arc<CameraModel>,
        ground_truth: Arc<dyn GroundTruthOracle>,
        config: TrackerConfig,
    ) -> Result<Self::Estimator> {
        (**self).build(camera, ground_truth, config)
    }
}

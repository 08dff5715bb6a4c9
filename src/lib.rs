//! Dual-estimator visual odometry fusion.
//!
//! Two monocular VO pipelines, each bound to a different feature-tracking
//! strategy, are driven with the same frame stream. Their latest positions are
//! blended into one fused trajectory, which is scored online against ground
//! truth together with the per-frame processing latency.

pub mod accumulator;
pub mod camera;
pub mod error;
pub mod estimator;
pub mod fusion;
pub mod ground_truth;
pub mod image;
pub mod odometry;
pub mod pair;
pub mod pose;
pub mod sink;
pub mod source;
pub mod tracker;

#[cfg(test)]
mod testing;

// Re-export main types
pub use accumulator::{mean_trajectory_error, AccuracyAccumulator, FrameRecord, RunReport, RunStatistics};
pub use camera::{CameraModel, Distortion};
pub use error::{Result, VoError};
pub use estimator::{EstimatorFactory, PoseEstimator};
pub use fusion::{FusionMethod, FusionPolicy, FusionWeights};
pub use ground_truth::{GroundTruthOracle, TrajectoryGroundTruth};
pub use image::GrayImage;
pub use odometry::{FusedOdometry, OdometryOptions};
pub use pair::{EstimatorPair, StepMode};
pub use pose::Pose3D;
pub use sink::{MemorySink, NullSink, ReportSink};
pub use source::{FrameSource, VecFrameSource};
pub use tracker::{TrackerConfig, TrackerStrategy};

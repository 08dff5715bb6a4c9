//! Read-only ground-truth oracles, used for scale and evaluation only.

use crate::pose::Pose3D;

/// Provides the true position (and absolute scale) for a frame index.
pub trait GroundTruthOracle: Send + Sync {
    fn position(&self, frame_id: usize) -> Option<Pose3D>;

    /// Number of frames covered.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distance travelled between `frame_id - 1` and `frame_id`.
    fn scale(&self, frame_id: usize) -> Option<f64> {
        if frame_id == 0 {
            return Some(0.0);
        }
        let prev = self.position(frame_id - 1)?;
        let curr = self.position(frame_id)?;
        Some(prev.distance(&curr))
    }
}

/// In-memory oracle over a precomputed trajectory.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryGroundTruth {
    positions: Vec<Pose3D>,
}

impl TrajectoryGroundTruth {
    pub fn new(positions: Vec<Pose3D>) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &[Pose3D] {
        &self.positions
    }
}

impl FromIterator<Pose3D> for TrajectoryGroundTruth {
    fn from_iter<I: IntoIterator<Item = Pose3D>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl GroundTruthOracle for TrajectoryGroundTruth {
    fn position(&self, frame_id: usize) -> Option<Pose3D> {
        self.positions.get(frame_id).copied()
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}

//! Positions in the estimator world frame.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A 3D position (x, y, z) in the estimator's world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Pose3D {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Pose3D) -> f64 {
        (self.to_vector() - other.to_vector()).norm()
    }

    /// Per-axis absolute difference to `other`.
    pub fn abs_diff(&self, other: &Pose3D) -> [f64; 3] {
        [
            (self.x - other.x).abs(),
            (self.y - other.y).abs(),
            (self.z - other.z).abs(),
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<Vector3<f64>> for Pose3D {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Pose3D> for Vector3<f64> {
    fn from(p: Pose3D) -> Self {
        p.to_vector()
    }
}

impl From<[f64; 3]> for Pose3D {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

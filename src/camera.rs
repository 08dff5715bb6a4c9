//! Pinhole camera model shared read-only by both pose estimators.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoError};

/// Radial/tangential distortion coefficients in OpenCV order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    #[serde(default)]
    pub k3: f64,
}

impl Distortion {
    pub fn coefficients(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }
}

/// Intrinsics, image size, and frame rate of a monocular camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Frames per second of the stream.
    pub fps: f64,
    #[serde(default)]
    pub distortion: Distortion,
}

impl CameraModel {
    pub fn new(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64, fps: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
            fps,
            distortion: Distortion::default(),
        }
    }

    pub fn with_distortion(mut self, distortion: Distortion) -> Self {
        self.distortion = distortion;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VoError::config("camera image size must be non-zero"));
        }
        if !(self.fx > 0.0 && self.fy > 0.0) {
            return Err(VoError::config("focal lengths must be > 0"));
        }
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(VoError::config("principal point must be finite"));
        }
        if !(self.fps > 0.0) {
            return Err(VoError::config("fps must be > 0"));
        }
        if self.distortion.coefficients().iter().any(|c| !c.is_finite()) {
            return Err(VoError::config("distortion coefficients must be finite"));
        }
        Ok(())
    }

    /// Whether any distortion coefficient is significant.
    pub fn is_distorted(&self) -> bool {
        self.distortion
            .coefficients()
            .iter()
            .any(|c| c.abs() > 1e-10)
    }

    /// Whether a pixel coordinate falls inside the image.
    pub fn contains(&self, uv: &Vector2<f64>) -> bool {
        uv.x >= 0.0 && uv.y >= 0.0 && uv.x < self.width as f64 && uv.y < self.height as f64
    }

    /// Projects a camera-frame point to pixel coordinates, ignoring distortion.
    /// Returns `None` for points at or behind the image plane.
    pub fn project(&self, p: &Vector3<f64>) -> Option<Vector2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        Some(Vector2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        ))
    }

    /// Back-projects a pixel to a unit-depth ray in the camera frame.
    pub fn unproject(&self, uv: &Vector2<f64>) -> Vector3<f64> {
        Vector3::new((uv.x - self.cx) / self.fx, (uv.y - self.cy) / self.fy, 1.0)
    }
}

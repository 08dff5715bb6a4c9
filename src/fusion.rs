//! Fusion of the two estimators' positions into one.
//!
//! The fused position is the convex blend `(1 - w) * a + w * b` with
//! `w = w2 / (w1 + w2)`. Equal averaging is the no-information baseline and
//! keeps `w = 0.5` for its whole lifetime; weighted averaging reads whatever
//! weights are current at the time of each call.

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoError};
use crate::pose::Pose3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    #[default]
    EqualAverage,
    WeightedAverage,
}

/// Non-negative weights of the first and second estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub w1: f64,
    pub w2: f64,
}

impl FusionWeights {
    pub const EQUAL: Self = Self { w1: 0.5, w2: 0.5 };

    pub fn new(w1: f64, w2: f64) -> Result<Self> {
        let weights = Self { w1, w2 };
        weights.validate()?;
        Ok(weights)
    }

    /// Inverse-error weights from each estimator's held-out mean error.
    pub fn from_mean_errors(err1: f64, err2: f64) -> Result<Self> {
        if !(err1 > 0.0 && err1.is_finite() && err2 > 0.0 && err2.is_finite()) {
            return Err(VoError::config(format!(
                "calibration errors must be finite and > 0 (got {err1}, {err2})"
            )));
        }
        Self::new(1.0 / err1, 1.0 / err2)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.w1.is_finite() && self.w2.is_finite()) {
            return Err(VoError::config("fusion weights must be finite"));
        }
        if self.w1 < 0.0 || self.w2 < 0.0 {
            return Err(VoError::config("fusion weights must be non-negative"));
        }
        if self.w1 + self.w2 <= 0.0 {
            return Err(VoError::config("fusion weights must not both be zero"));
        }
        Ok(())
    }

    /// Share of the second estimator, `w2 / (w1 + w2)`.
    pub fn blend_factor(&self) -> Result<f64> {
        self.validate()?;
        Ok(self.w2 / (self.w1 + self.w2))
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::EQUAL
    }
}

/// Fuses `pos_a` and `pos_b` under `method`. Equal averaging ignores
/// `weights`.
pub fn combine(
    method: FusionMethod,
    weights: &FusionWeights,
    pos_a: Pose3D,
    pos_b: Pose3D,
) -> Result<Pose3D> {
    let (a, b) = (pos_a.to_vector(), pos_b.to_vector());
    let fused = match method {
        FusionMethod::EqualAverage => (a + b) * 0.5,
        FusionMethod::WeightedAverage => {
            let w = weights.blend_factor()?;
            a * (1.0 - w) + b * w
        }
    };
    Ok(fused.into())
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusionPolicy {
    method: FusionMethod,
    weights: FusionWeights,
}

impl FusionPolicy {
    /// Weighted averaging starts from `(1, 1)` until weights are assigned.
    pub fn new(method: FusionMethod) -> Self {
        let weights = match method {
            FusionMethod::EqualAverage => FusionWeights::EQUAL,
            FusionMethod::WeightedAverage => FusionWeights { w1: 1.0, w2: 1.0 },
        };
        Self { method, weights }
    }

    pub fn equal() -> Self {
        Self::new(FusionMethod::EqualAverage)
    }

    pub fn weighted(w1: f64, w2: f64) -> Result<Self> {
        let mut policy = Self::new(FusionMethod::WeightedAverage);
        policy.set_weights(w1, w2)?;
        Ok(policy)
    }

    pub fn method(&self) -> FusionMethod {
        self.method
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Reassigns the weights. Only already-fused positions are unaffected;
    /// every later `combine` uses the new values.
    pub fn set_weights(&mut self, w1: f64, w2: f64) -> Result<()> {
        if self.method == FusionMethod::EqualAverage {
            return Err(VoError::config(
                "equal-average fusion weights are fixed at 0.5/0.5",
            ));
        }
        self.weights = FusionWeights::new(w1, w2)?;
        info!("fusion weights set to w1={w1:.6}, w2={w2:.6}");
        Ok(())
    }

    pub fn blend_factor(&self) -> Result<f64> {
        match self.method {
            FusionMethod::EqualAverage => Ok(0.5),
            FusionMethod::WeightedAverage => self.weights.blend_factor(),
        }
    }

    pub fn combine(&self, pos_a: Pose3D, pos_b: Pose3D) -> Result<Pose3D> {
        combine(self.method, &self.weights, pos_a, pos_b)
    }
}

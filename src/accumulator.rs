//! Online accuracy and latency bookkeeping for the fused trajectory.

use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, VoError};
use crate::pose::Pose3D;

/// What the accumulator emits for one observed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameRecord {
    pub frame_id: usize,
    pub fused: Pose3D,
    pub truth: Pose3D,
    /// |truth - fused| per axis.
    pub abs_error: [f64; 3],
    pub error: f64,
    pub cumulative_error: f64,
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunReport {
    pub frames: usize,
    pub total_error: f64,
    pub mean_error: f64,
    pub max_error: f64,
    pub mean_latency: Duration,
}

/// Latency log plus running error sum. Never reset mid-run.
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    latencies: Vec<Duration>,
    error_sum: f64,
    max_error: f64,
    observed: usize,
}

impl RunStatistics {
    pub fn latencies(&self) -> &[Duration] {
        &self.latencies
    }

    pub fn error_sum(&self) -> f64 {
        self.error_sum
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn mean_latency(&self) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let total: Duration = self.latencies.iter().sum();
        Some(Duration::from_secs_f64(
            total.as_secs_f64() / self.latencies.len() as f64,
        ))
    }

    pub fn mean_error(&self) -> Option<f64> {
        if self.observed == 0 {
            return None;
        }
        Some(self.error_sum / self.observed as f64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccuracyAccumulator {
    stats: RunStatistics,
}

impl AccuracyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the latency of a processed frame that is not scored (warm-up).
    pub fn record_latency(&mut self, latency: Duration) {
        self.stats.latencies.push(latency);
    }

    /// Adds the Euclidean error of `fused` against `truth` and logs `latency`.
    /// Each frame id must be observed at most once; repeats are counted again.
    pub fn observe(
        &mut self,
        frame_id: usize,
        fused: Pose3D,
        truth: Pose3D,
        latency: Duration,
    ) -> FrameRecord {
        let error = fused.distance(&truth);
        self.stats.error_sum += error;
        self.stats.max_error = self.stats.max_error.max(error);
        self.stats.observed += 1;
        self.stats.latencies.push(latency);

        FrameRecord {
            frame_id,
            fused,
            truth,
            abs_error: truth.abs_diff(&fused),
            error,
            cumulative_error: self.stats.error_sum,
            latency,
        }
    }

    pub fn report(&self) -> Result<RunReport> {
        let (Some(mean_error), Some(mean_latency)) =
            (self.stats.mean_error(), self.stats.mean_latency())
        else {
            return Err(VoError::NotReady("no frame has been observed yet"));
        };
        Ok(RunReport {
            frames: self.stats.observed,
            total_error: self.stats.error_sum,
            mean_error,
            max_error: self.stats.max_error,
            mean_latency,
        })
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }
}

/// Mean Euclidean distance between an estimated trajectory and ground truth
/// over their common prefix. Used to calibrate inverse-error fusion weights.
pub fn mean_trajectory_error(estimates: &[Pose3D], truth: &[Pose3D]) -> Result<f64> {
    let n = estimates.len().min(truth.len());
    if n == 0 {
        return Err(VoError::NotReady("trajectory is empty"));
    }
    let sum: f64 = estimates
        .iter()
        .zip(truth)
        .map(|(est, gt)| est.distance(gt))
        .sum();
    Ok(sum / n as f64)
}

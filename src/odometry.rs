//! Frame-sequential driver tying the pair, fusion, and accounting together.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::accumulator::{AccuracyAccumulator, FrameRecord, RunReport};
use crate::error::{Result, VoError};
use crate::estimator::PoseEstimator;
use crate::fusion::FusionPolicy;
use crate::image::GrayImage;
use crate::pair::EstimatorPair;
use crate::pose::Pose3D;
use crate::sink::ReportSink;
use crate::source::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryOptions {
    /// Frames with a lower id are tracked and fused but not scored.
    pub warmup_frames: usize,
    /// Upper bound on the frame ids pulled from a source.
    pub max_frames: Option<usize>,
    /// Log and skip frames the pair rejects instead of aborting the run.
    pub skip_rejected_frames: bool,
}

pub struct FusedOdometry<E: PoseEstimator> {
    pair: EstimatorPair<E>,
    policy: FusionPolicy,
    accumulator: AccuracyAccumulator,
    options: OdometryOptions,
    fused: Vec<(usize, Pose3D)>,
}

impl<E: PoseEstimator> FusedOdometry<E> {
    pub fn new(pair: EstimatorPair<E>, policy: FusionPolicy, options: OdometryOptions) -> Self {
        Self {
            pair,
            policy,
            accumulator: AccuracyAccumulator::new(),
            options,
            fused: Vec::new(),
        }
    }

    /// Processes one frame. A missing image is skipped and leaves all state
    /// as it was; `Ok(None)` is also returned for warm-up frames.
    pub fn process_frame(
        &mut self,
        image: Option<&GrayImage>,
        frame_id: usize,
        sink: &mut dyn ReportSink,
    ) -> Result<Option<FrameRecord>> {
        let Some(image) = image else {
            warn!("frame {frame_id}: no image, skipping");
            return Ok(None);
        };

        let latency = self.pair.step(Some(image), frame_id)?;
        let (pos_a, pos_b) = self.pair.latest_estimates()?;
        let fused = self.policy.combine(pos_a, pos_b)?;
        self.fused.push((frame_id, fused));

        if frame_id < self.options.warmup_frames {
            self.accumulator.record_latency(latency);
            return Ok(None);
        }

        let truth = self.pair.latest_ground_truth()?;
        let record = self.accumulator.observe(frame_id, fused, truth, latency);
        sink.record(&record)?;
        Ok(Some(record))
    }

    /// Pulls frames from `source` starting at id 0 until it runs dry or
    /// `max_frames` is reached, then reports.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn ReportSink,
    ) -> Result<RunReport> {
        let mut frame_id = 0;
        while source.has_more(frame_id)
            && self.options.max_frames.map_or(true, |max| frame_id < max)
        {
            let image = source.image(frame_id);
            match self.process_frame(image.as_ref(), frame_id, sink) {
                Ok(_) => {}
                Err(err @ VoError::Frame { .. }) if self.options.skip_rejected_frames => {
                    warn!("{err}; skipping");
                }
                Err(err) => return Err(err),
            }
            frame_id += 1;
        }

        let report = self.accumulator.report()?;
        info!(
            "run complete: {} frames scored, mean error {:.4}, mean latency {:?}",
            report.frames, report.mean_error, report.mean_latency
        );
        sink.finish(&report)?;
        Ok(report)
    }

    /// Reassigns fusion weights; takes effect from the next frame on.
    pub fn set_weights(&mut self, w1: f64, w2: f64) -> Result<()> {
        self.policy.set_weights(w1, w2)?;
        if self.pair.processed_frames() > 0 {
            warn!(
                "fusion weights changed after {} frames; earlier fused positions keep their old weights",
                self.pair.processed_frames()
            );
        }
        Ok(())
    }

    pub fn report(&self) -> Result<RunReport> {
        self.accumulator.report()
    }

    pub fn pair(&self) -> &EstimatorPair<E> {
        &self.pair
    }

    pub fn policy(&self) -> &FusionPolicy {
        &self.policy
    }

    pub fn accumulator(&self) -> &AccuracyAccumulator {
        &self.accumulator
    }

    /// Fused positions keyed by frame id, warm-up frames included.
    pub fn fused_trajectory(&self) -> &[(usize, Pose3D)] {
        &self.fused
    }
}

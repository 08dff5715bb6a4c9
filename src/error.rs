//! Error taxonomy for the dual-estimator core.

use thiserror::Error;

/// Boxed failure reported by an external pose estimator.
pub type EstimatorFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum VoError {
    /// Invalid or duplicate tracker strategies, bad weights, or mutation of an
    /// immutable fusion method. Raised at setup time, never recovered.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The frame handed to a step was missing or unreadable.
    #[error("frame {frame_id} rejected: {reason}")]
    Frame { frame_id: usize, reason: String },
    /// An estimate or report was requested before any frame was processed.
    #[error("not ready: {0}")]
    NotReady(&'static str),
    /// The two estimator trajectories no longer refer to the same frame.
    #[error("estimator trajectories out of step: {first} vs {second} entries")]
    Desynchronized { first: usize, second: usize },
    #[error("report sink failed: {0}")]
    Sink(String),
    #[error("estimator {index} failed: {source}")]
    Estimator {
        index: usize,
        #[source]
        source: EstimatorFailure,
    },
}

impl VoError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn frame(frame_id: usize, reason: impl Into<String>) -> Self {
        Self::Frame {
            frame_id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VoError>;

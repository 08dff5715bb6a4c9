//! Consumers of per-frame records and the end-of-run report.

use crate::accumulator::{FrameRecord, RunReport};
use crate::error::Result;

pub trait ReportSink {
    fn record(&mut self, record: &FrameRecord) -> Result<()>;

    fn finish(&mut self, _report: &RunReport) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub records: Vec<FrameRecord>,
    pub report: Option<RunReport>,
}

impl ReportSink for MemorySink {
    fn record(&mut self, record: &FrameRecord) -> Result<()> {
        self.records.push(*record);
        Ok(())
    }

    fn finish(&mut self, report: &RunReport) -> Result<()> {
        self.report = Some(*report);
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn record(&mut self, _record: &FrameRecord) -> Result<()> {
        Ok(())
    }
}

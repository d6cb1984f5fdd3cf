//! Frame gaps: runs of consecutive VCFC values per virtual channel.

use super::tracker::{GapDecision, RangeSummary, SequenceGapTracker};
use super::GapAnalyzer;
use crate::report::TextLayout;
use crate::store::FrameRecord;
use crate::types::{format_ert, Vcid};
use chrono::{DateTime, Utc};

/// Largest VCFC value; the counter is 24 bits wide.
pub const MAX_VCFC: u32 = 0x00FF_FFFF;

pub const VCFC_MODULUS: u64 = MAX_VCFC as u64 + 1;

/// A run of frames on one VCID, stamped with ERT.
pub type FrameRange = RangeSummary<Vcid, DateTime<Utc>>;

const RULE_WIDTH: usize = 44;

#[derive(Clone, Debug)]
pub struct FrameGapTracker {
    runs: SequenceGapTracker<Vcid, DateTime<Utc>>,
}

impl Default for FrameGapTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGapTracker {
    pub fn new() -> Self {
        Self {
            runs: SequenceGapTracker::wrapping(VCFC_MODULUS),
        }
    }

    /// Feeds one frame. Frames without a VCFC are not tracked.
    pub fn process(&mut self, frame: &FrameRecord) -> Option<GapDecision<FrameRange>> {
        let vcfc = frame.vcfc?;
        Some(self.runs.process(frame.vcid, u64::from(vcfc), frame.ert))
    }

    pub fn flush(&mut self) -> Vec<FrameRange> {
        self.runs.flush()
    }

    pub fn tracker(&self) -> &SequenceGapTracker<Vcid, DateTime<Utc>> {
        &self.runs
    }
}

impl GapAnalyzer for FrameGapTracker {
    type Record = FrameRecord;
    type Summary = FrameRange;

    fn record_noun(&self) -> &'static str {
        "frames"
    }

    fn observe(&mut self, record: &FrameRecord) -> Option<GapDecision<FrameRange>> {
        self.process(record)
    }

    fn flush(&mut self) -> Vec<FrameRange> {
        FrameGapTracker::flush(self)
    }
}

impl TextLayout for FrameRange {
    fn header() -> String {
        format!("{:>26} {:>6}", "ERT", "VCFC")
    }

    fn render(&self) -> String {
        format!(
            "{:>26} {:>6} VCID={}\n{:>26} {:>6} count={}\n{}",
            format_ert(&self.start.stamp),
            self.start.counter,
            self.key,
            format_ert(&self.last.stamp),
            self.last.counter,
            self.run_length,
            "-".repeat(RULE_WIDTH)
        )
    }
}

//! Gap detection over frame and packet streams.

pub mod frame;
pub mod packet;
pub mod tracker;

pub use frame::{FrameGapTracker, FrameRange, MAX_VCFC, VCFC_MODULUS};
pub use packet::{PacketGapTracker, PacketGroup, PacketRange, PacketTimes};
pub use tracker::{
    CounterModel, GapDecision, RangeSummary, RunEndpoint, RunPhase, RunState, SequenceGapTracker,
};

/// A gap tracker bound to one record type.
///
/// This is the seam between the generic driver loop and the frame or packet
/// specialization.
pub trait GapAnalyzer {
    type Record;
    type Summary;

    /// Plural record name used in operator messages, e.g. "frames".
    fn record_noun(&self) -> &'static str;

    /// Feeds one record. `None` means the record carries no usable sequence
    /// fields and was skipped.
    fn observe(&mut self, record: &Self::Record) -> Option<GapDecision<Self::Summary>>;

    /// Summaries of all open runs, in ascending key order.
    fn flush(&mut self) -> Vec<Self::Summary>;
}

//! Packet gaps: runs of consecutive SPSC values per VCID.
//!
//! Packets whose VCID is unknown share a single group that sorts after every
//! real VCID.

use super::tracker::{GapDecision, RangeSummary, SequenceGapTracker};
use super::GapAnalyzer;
use crate::report::TextLayout;
use crate::store::PacketRecord;
use crate::types::{format_ert, format_scet, Sclk, Vcid};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Grouping key for packet runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketGroup {
    Vcid(Vcid),
    /// Packets stored without a VCID
    NoVcid,
}

impl From<Option<Vcid>> for PacketGroup {
    fn from(vcid: Option<Vcid>) -> Self {
        vcid.map_or(PacketGroup::NoVcid, PacketGroup::Vcid)
    }
}

impl PacketGroup {
    pub fn vcid(&self) -> Option<Vcid> {
        match self {
            PacketGroup::Vcid(v) => Some(*v),
            PacketGroup::NoVcid => None,
        }
    }
}

impl fmt::Display for PacketGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketGroup::Vcid(v) => write!(f, "{}", v),
            PacketGroup::NoVcid => f.write_str("NULL"),
        }
    }
}

impl Serialize for PacketGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.vcid().serialize(serializer)
    }
}

/// Time stamps carried by each end of a packet run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PacketTimes {
    pub ert: DateTime<Utc>,
    pub scet: DateTime<Utc>,
    pub sclk: Sclk,
}

impl PacketTimes {
    fn of(packet: &PacketRecord) -> Self {
        Self {
            ert: packet.ert,
            scet: packet.scet,
            sclk: packet.sclk,
        }
    }
}

pub type PacketRange = RangeSummary<PacketGroup, PacketTimes>;

const RULE_WIDTH: usize = 86;

/// SPSC gap tracker for packets of a single APID.
///
/// The successor check is plain integer increment; SPSC rollover shows up
/// as a gap.
#[derive(Clone, Debug)]
pub struct PacketGapTracker {
    runs: SequenceGapTracker<PacketGroup, PacketTimes>,
}

impl Default for PacketGapTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketGapTracker {
    pub fn new() -> Self {
        Self {
            runs: SequenceGapTracker::unbounded(),
        }
    }

    pub fn process(&mut self, packet: &PacketRecord) -> GapDecision<PacketRange> {
        self.runs.process(
            PacketGroup::from(packet.vcid),
            u64::from(packet.spsc),
            PacketTimes::of(packet),
        )
    }

    pub fn flush(&mut self) -> Vec<PacketRange> {
        self.runs.flush()
    }

    pub fn tracker(&self) -> &SequenceGapTracker<PacketGroup, PacketTimes> {
        &self.runs
    }
}

impl GapAnalyzer for PacketGapTracker {
    type Record = PacketRecord;
    type Summary = PacketRange;

    fn record_noun(&self) -> &'static str {
        "packets"
    }

    fn observe(&mut self, record: &PacketRecord) -> Option<GapDecision<PacketRange>> {
        Some(self.process(record))
    }

    fn flush(&mut self) -> Vec<PacketRange> {
        PacketGapTracker::flush(self)
    }
}

impl TextLayout for PacketRange {
    fn header() -> String {
        format!("{:>25} {:>23} {:>17} {:>7}", "ERT", "SCET", "SCLK", "PKTSEQ")
    }

    fn render(&self) -> String {
        let (start, last) = (&self.start, &self.last);
        format!(
            "{:>25} {:>23} {:>17} {:>7} VCID={}\n{:>25} {:>23} {:>17} {:>7} Total={}\n{}",
            format_ert(&start.stamp.ert),
            format_scet(&start.stamp.scet),
            start.stamp.sclk.to_string(),
            start.counter,
            self.key,
            format_ert(&last.stamp.ert),
            format_scet(&last.stamp.scet),
            last.stamp.sclk.to_string(),
            last.counter,
            self.run_length,
            "-".repeat(RULE_WIDTH)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::RunEndpoint;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn packet(spsc: u32, vcid: Option<Vcid>, secs: i64) -> PacketRecord {
        PacketRecord::new(64, spsc, vcid, t(secs)).with_times(t(secs - 600), Sclk::new(1000 + secs as u32, 0))
    }

    #[test]
    fn test_spsc_run_and_gap() {
        let mut tracker = PacketGapTracker::new();
        tracker.process(&packet(100, Some(0), 0));
        tracker.process(&packet(101, Some(0), 1));

        let closed = tracker.process(&packet(104, Some(0), 2)).into_closed().unwrap();
        assert_eq!(closed.key, PacketGroup::Vcid(0));
        assert_eq!((closed.start.counter, closed.last.counter), (100, 101));
        assert_eq!(closed.last.stamp.sclk, Sclk::new(1001, 0));
        assert_eq!(closed.last.stamp.scet, t(-599));
    }

    #[test]
    fn test_spsc_does_not_wrap() {
        let mut tracker = PacketGapTracker::new();
        tracker.process(&packet(u32::MAX, Some(1), 0));
        assert!(tracker.process(&packet(0, Some(1), 1)).is_gap());
    }

    #[test]
    fn test_null_vcid_group_sorts_last() {
        let mut tracker = PacketGapTracker::new();
        tracker.process(&packet(1, None, 0));
        tracker.process(&packet(7, Some(5), 1));
        tracker.process(&packet(2, None, 2));

        let summaries = tracker.flush();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].key, PacketGroup::Vcid(5));
        assert_eq!(summaries[1].key, PacketGroup::NoVcid);
        assert_eq!(summaries[1].run_length, 2);
    }

    #[test]
    fn test_group_display_and_json() {
        assert_eq!(PacketGroup::Vcid(3).to_string(), "3");
        assert_eq!(PacketGroup::NoVcid.to_string(), "NULL");
        assert_eq!(serde_json::to_string(&PacketGroup::NoVcid).unwrap(), "null");
        assert_eq!(serde_json::to_string(&PacketGroup::Vcid(3)).unwrap(), "3");
    }

    #[test]
    fn test_text_layout() {
        let times = PacketTimes {
            ert: t(0),
            scet: t(-600),
            sclk: Sclk::new(42, 7),
        };
        let range = PacketRange {
            key: PacketGroup::NoVcid,
            start: RunEndpoint { counter: 10, stamp: times.clone() },
            last: RunEndpoint { counter: 12, stamp: times },
            run_length: 3,
        };

        let text = range.render();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("     10 VCID=NULL"));
        assert!(lines[0].contains("0000000042.00007"));
        assert!(lines[1].ends_with("     12 Total=3"));
        assert_eq!(lines[2].len(), 86);
        assert!(PacketRange::header().ends_with(" PKTSEQ"));
    }
}

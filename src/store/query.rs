//! Query filters for the frame and packet sources.
//!
//! Each filter can be evaluated in memory (`matches`) and is translated to a
//! WHERE clause by the SQLite store.

use super::types::{FrameRecord, PacketRecord};
use crate::types::{Apid, DssId, Sclk, Vcid};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Inclusive time range; an open end is unbounded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeRange {
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
        }
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.begin.map_or(true, |b| *time >= b) && self.end.map_or(true, |e| *time <= e)
    }
}

/// Inclusive SCLK range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SclkRange {
    pub begin: Option<Sclk>,
    pub end: Option<Sclk>,
}

impl SclkRange {
    pub fn contains(&self, sclk: &Sclk) -> bool {
        self.begin.map_or(true, |b| *sclk >= b) && self.end.map_or(true, |e| *sclk <= e)
    }
}

/// Ordering for frame queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameOrder {
    #[default]
    Ert,
    Rct,
    /// Store insertion order
    None,
}

/// Frame selection used by the frame gap app.
#[derive(Clone, Debug, Default)]
pub struct FrameQuery {
    pub ert: TimeRange,
    pub frame_type: Option<String>,
    pub relay_scid: Option<u32>,
    pub vcids: Option<BTreeSet<Vcid>>,
    pub dss_ids: Option<BTreeSet<DssId>>,
    pub order: FrameOrder,
}

impl FrameQuery {
    pub fn matches(&self, frame: &FrameRecord) -> bool {
        self.ert.contains(&frame.ert)
            && self
                .frame_type
                .as_ref()
                .map_or(true, |t| frame.frame_type == *t)
            && self
                .relay_scid
                .map_or(true, |scid| frame.relay_scid == Some(scid))
            && in_set(&self.vcids, &frame.vcid)
            && in_set(&self.dss_ids, &frame.dss_id)
    }

    /// Sort order matching the SQL ORDER BY for this query.
    pub fn compare(&self, a: &FrameRecord, b: &FrameRecord) -> Ordering {
        match self.order {
            FrameOrder::Ert => a.ert.cmp(&b.ert).then(a.id.cmp(&b.id)),
            FrameOrder::Rct => a.rct.cmp(&b.rct).then(a.id.cmp(&b.id)),
            FrameOrder::None => a.id.cmp(&b.id),
        }
    }
}

/// Time domain used to bound a packet query.
#[derive(Clone, Debug, PartialEq)]
pub enum PacketTimeWindow {
    Ert(TimeRange),
    Scet(TimeRange),
    Rct(TimeRange),
    Sclk(SclkRange),
}

impl Default for PacketTimeWindow {
    fn default() -> Self {
        PacketTimeWindow::Ert(TimeRange::default())
    }
}

impl PacketTimeWindow {
    pub fn contains(&self, packet: &PacketRecord) -> bool {
        match self {
            PacketTimeWindow::Ert(range) => range.contains(&packet.ert),
            PacketTimeWindow::Scet(range) => range.contains(&packet.scet),
            PacketTimeWindow::Rct(range) => range.contains(&packet.rct),
            PacketTimeWindow::Sclk(range) => range.contains(&packet.sclk),
        }
    }

    /// Ordering implied by the time type when none is requested.
    pub fn default_order(&self) -> PacketOrder {
        match self {
            PacketTimeWindow::Ert(_) => PacketOrder::Ert,
            PacketTimeWindow::Scet(_) => PacketOrder::Scet,
            PacketTimeWindow::Rct(_) => PacketOrder::Rct,
            PacketTimeWindow::Sclk(_) => PacketOrder::Sclk,
        }
    }
}

/// Ordering for packet queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketOrder {
    Ert,
    Scet,
    Rct,
    Sclk,
    Spsc,
    None,
}

/// Flight software packets, simulation/support equipment packets, or both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PacketSelection {
    #[default]
    All,
    FswOnly,
    SseOnly,
}

/// Packet selection used by the packet gap and time-correlation apps.
#[derive(Clone, Debug, Default)]
pub struct PacketQuery {
    pub window: PacketTimeWindow,
    pub apid: Option<Apid>,
    pub vcids: Option<BTreeSet<Vcid>>,
    pub dss_ids: Option<BTreeSet<DssId>>,
    pub selection: PacketSelection,
    /// Explicit ordering; defaults to the window's time type
    pub order: Option<PacketOrder>,
    /// Load packet bodies (needed for time correlation only)
    pub include_body: bool,
}

impl PacketQuery {
    pub fn effective_order(&self) -> PacketOrder {
        self.order.unwrap_or_else(|| self.window.default_order())
    }

    pub fn matches(&self, packet: &PacketRecord) -> bool {
        let source_ok = match self.selection {
            PacketSelection::All => true,
            PacketSelection::FswOnly => !packet.from_sse,
            PacketSelection::SseOnly => packet.from_sse,
        };

        source_ok
            && self.window.contains(packet)
            && self.apid.map_or(true, |apid| packet.apid == apid)
            && self
                .vcids
                .as_ref()
                .map_or(true, |set| packet.vcid.map_or(false, |v| set.contains(&v)))
            && in_set(&self.dss_ids, &packet.dss_id)
    }

    pub fn compare(&self, a: &PacketRecord, b: &PacketRecord) -> Ordering {
        let primary = match self.effective_order() {
            PacketOrder::Ert => a.ert.cmp(&b.ert),
            PacketOrder::Scet => a.scet.cmp(&b.scet),
            PacketOrder::Rct => a.rct.cmp(&b.rct),
            PacketOrder::Sclk => a.sclk.cmp(&b.sclk),
            PacketOrder::Spsc => a.spsc.cmp(&b.spsc),
            PacketOrder::None => Ordering::Equal,
        };
        primary.then(a.id.cmp(&b.id))
    }
}

/// Bounded lookup of the frames that may have carried a TC packet.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameWindowQuery {
    pub vcid: Vcid,
    pub vcfc: u32,
    /// Inclusive ERT window
    pub ert_begin: DateTime<Utc>,
    pub ert_end: DateTime<Utc>,
    /// Maximum rows returned, newest first
    pub limit: usize,
}

impl FrameWindowQuery {
    pub fn matches(&self, frame: &FrameRecord) -> bool {
        frame.vcid == self.vcid
            && frame.vcfc == Some(self.vcfc)
            && frame.ert >= self.ert_begin
            && frame.ert <= self.ert_end
    }
}

fn in_set<T: Ord>(set: &Option<BTreeSet<T>>, value: &T) -> bool {
    set.as_ref().map_or(true, |s| s.contains(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_frame_query_filters() {
        let query = FrameQuery {
            ert: TimeRange::new(t(0), t(100)),
            vcids: Some([1, 2].into_iter().collect()),
            ..Default::default()
        };

        assert!(query.matches(&FrameRecord::new(1, 5, 14, t(50))));
        assert!(!query.matches(&FrameRecord::new(3, 5, 14, t(50))));
        assert!(!query.matches(&FrameRecord::new(1, 5, 14, t(101))));
    }

    #[test]
    fn test_packet_query_vcid_filter_excludes_null_vcid() {
        let query = PacketQuery {
            apid: Some(5),
            vcids: Some([0].into_iter().collect()),
            ..Default::default()
        };

        assert!(query.matches(&PacketRecord::new(5, 1, Some(0), t(0))));
        assert!(!query.matches(&PacketRecord::new(5, 1, None, t(0))));
        assert!(!query.matches(&PacketRecord::new(6, 1, Some(0), t(0))));
    }

    #[test]
    fn test_packet_default_order_follows_time_type() {
        let query = PacketQuery {
            window: PacketTimeWindow::Sclk(SclkRange::default()),
            ..Default::default()
        };
        assert_eq!(query.effective_order(), PacketOrder::Sclk);

        let explicit = PacketQuery {
            order: Some(PacketOrder::Spsc),
            ..query
        };
        assert_eq!(explicit.effective_order(), PacketOrder::Spsc);
    }

    #[test]
    fn test_window_query_bounds_are_inclusive() {
        let end = t(3600);
        let query = FrameWindowQuery {
            vcid: 2,
            vcfc: 77,
            ert_begin: end - Duration::hours(1),
            ert_end: end,
            limit: 50,
        };

        assert!(query.matches(&FrameRecord::new(2, 77, 14, end)));
        assert!(query.matches(&FrameRecord::new(2, 77, 14, t(0))));
        assert!(!query.matches(&FrameRecord::new(2, 77, 14, t(-1))));
        assert!(!query.matches(&FrameRecord::new(2, 78, 14, end)));
    }
}

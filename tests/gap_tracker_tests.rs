//! Gap tracker properties over longer and interleaved streams.

use chrono::{DateTime, Duration, TimeZone, Utc};
use gds_fetch::gap::{FrameGapTracker, GapDecision, PacketGapTracker, PacketGroup, MAX_VCFC};
use gds_fetch::store::{FrameRecord, PacketRecord};
use gds_fetch::types::Vcid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn frame(vcid: Vcid, vcfc: u32, ms: i64) -> FrameRecord {
    FrameRecord::new(vcid, vcfc, 14, epoch() + Duration::milliseconds(ms))
}

#[test]
fn consecutive_run_yields_single_summary() {
    let mut tracker = FrameGapTracker::new();
    for (i, vcfc) in (1000..1500).enumerate() {
        assert_eq!(tracker.process(&frame(4, vcfc, i as i64)), Some(GapDecision::Continued));
    }

    let summaries = tracker.flush();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].start.counter, 1000);
    assert_eq!(summaries[0].last.counter, 1499);
    assert_eq!(summaries[0].start.stamp, epoch());
    assert_eq!(summaries[0].last.stamp, epoch() + Duration::milliseconds(499));
    assert_eq!(summaries[0].run_length, 500);
}

#[test]
fn single_gap_splits_into_two_runs() {
    let mut tracker = FrameGapTracker::new();
    let mut closed = Vec::new();
    for (i, vcfc) in [10, 11, 12, 20, 21].into_iter().enumerate() {
        if let Some(summary) = tracker.process(&frame(0, vcfc, i as i64)).and_then(|d| d.into_closed()) {
            closed.push(summary);
        }
    }
    closed.extend(tracker.flush());

    let spans: Vec<(u64, u64, u64)> = closed
        .iter()
        .map(|s| (s.start.counter, s.last.counter, s.run_length))
        .collect();
    assert_eq!(spans, vec![(10, 12, 3), (20, 21, 2)]);
}

#[test]
fn gap_between_six_and_nine() {
    let mut tracker = FrameGapTracker::new();
    assert!(!tracker.process(&frame(1, 5, 1)).unwrap().is_gap());
    assert!(!tracker.process(&frame(1, 6, 2)).unwrap().is_gap());

    let decision = tracker.process(&frame(1, 9, 3)).unwrap();
    assert!(decision.is_gap());
    let first = decision.into_closed().unwrap();
    let second = tracker.flush().remove(0);

    assert_eq!(first.key, 1);
    assert_eq!((first.start.counter, first.last.counter, first.run_length), (5, 6, 2));
    assert_eq!(first.start.stamp, epoch() + Duration::milliseconds(1));
    assert_eq!(first.last.stamp, epoch() + Duration::milliseconds(2));
    assert_eq!((second.start.counter, second.last.counter, second.run_length), (9, 9, 1));
    assert_eq!(second.start.stamp, second.last.stamp);
}

#[test]
fn wraparound_sequence_is_one_run() {
    let mut tracker = FrameGapTracker::new();
    let sequence = [MAX_VCFC - 1, MAX_VCFC, 0, 1];
    for (i, vcfc) in sequence.into_iter().enumerate() {
        assert!(!tracker.process(&frame(0, vcfc, i as i64)).unwrap().is_gap());
    }

    let summaries = tracker.flush();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].run_length, 4);
}

#[test]
fn repeated_counter_counts_toward_run() {
    let mut tracker = FrameGapTracker::new();
    for (i, vcfc) in [3, 3, 3, 4].into_iter().enumerate() {
        tracker.process(&frame(0, vcfc, i as i64));
    }

    let summary = &tracker.flush()[0];
    assert_eq!(summary.run_length, 4);
    assert_eq!(summary.last.stamp, epoch() + Duration::milliseconds(3));
}

/// Each key's summaries must match what the key produces when tracked alone,
/// whatever the interleaving.
#[test]
fn interleaved_keys_do_not_interact() {
    let mut rng = StdRng::seed_from_u64(0x6A70);
    let vcids: [Vcid; 4] = [0, 1, 6, 32];

    let mut streams: BTreeMap<Vcid, Vec<u32>> = BTreeMap::new();
    for vcid in vcids {
        let mut vcfc: u32 = rng.gen_range(0..=MAX_VCFC);
        let counters = streams.entry(vcid).or_default();
        for _ in 0..200 {
            counters.push(vcfc);
            let step = match rng.gen_range(0..10) {
                0 => 0,
                1 => rng.gen_range(2..50),
                _ => 1,
            };
            vcfc = (vcfc + step) & MAX_VCFC;
        }
    }

    let mut alone = BTreeMap::new();
    for (vcid, counters) in &streams {
        let mut tracker = FrameGapTracker::new();
        let mut out = Vec::new();
        for (i, vcfc) in counters.iter().enumerate() {
            out.extend(tracker.process(&frame(*vcid, *vcfc, i as i64)).and_then(|d| d.into_closed()));
        }
        out.extend(tracker.flush());
        alone.insert(*vcid, out);
    }

    let mut cursors: BTreeMap<Vcid, usize> = vcids.iter().map(|v| (*v, 0)).collect();
    let mut tracker = FrameGapTracker::new();
    let mut mixed: BTreeMap<Vcid, Vec<_>> = BTreeMap::new();
    loop {
        let pending: Vec<Vcid> = cursors
            .iter()
            .filter(|(vcid, idx)| **idx < streams[*vcid].len())
            .map(|(vcid, _)| *vcid)
            .collect();
        if pending.is_empty() {
            break;
        }
        let vcid = pending[rng.gen_range(0..pending.len())];
        let idx = cursors[&vcid];
        let vcfc = streams[&vcid][idx];
        if let Some(summary) = tracker.process(&frame(vcid, vcfc, idx as i64)).and_then(|d| d.into_closed()) {
            mixed.entry(vcid).or_default().push(summary);
        }
        cursors.insert(vcid, idx + 1);
    }
    for summary in tracker.flush() {
        mixed.entry(summary.key).or_default().push(summary);
    }

    assert_eq!(mixed, alone);
}

#[test]
fn packet_groups_split_by_vcid_with_null_group() {
    let t0 = epoch();
    let packets = vec![
        PacketRecord::new(64, 1, Some(2), t0),
        PacketRecord::new(64, 50, None, t0 + Duration::seconds(1)),
        PacketRecord::new(64, 2, Some(2), t0 + Duration::seconds(2)),
        PacketRecord::new(64, 51, None, t0 + Duration::seconds(3)),
        PacketRecord::new(64, 3, Some(2), t0 + Duration::seconds(4)),
    ];

    let mut tracker = PacketGapTracker::new();
    for packet in &packets {
        assert!(!tracker.process(packet).is_gap());
    }

    let summaries = tracker.flush();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].key, PacketGroup::Vcid(2));
    assert_eq!(summaries[0].run_length, 3);
    assert_eq!(summaries[1].key, PacketGroup::NoVcid);
    assert_eq!(summaries[1].start.counter, 50);
    assert_eq!(summaries[1].last.stamp.ert, t0 + Duration::seconds(3));
}

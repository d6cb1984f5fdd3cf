//! # Time Correlation Resolver
//!
//! Joins a time-correlation packet to the downlink frame(s) that carried it.
//!
//! The packet body names the frame by VCID and VCFC. VCFC wraps every 2^24
//! frames, so the search is bounded to a lookback window ending at the
//! packet ERT, and only the newest frame per ground station is kept.

use super::decode::{EncodingType, ReferenceTcDecoder, TimeCorrelationDecoder};
use crate::config::TimeCorrelationConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::FetchError;
use crate::store::{FrameLookup, FrameRecord, FrameWindowQuery, PacketRecord};
use crate::types::{DssId, Sclk, Vcid};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A frame matched to a TC packet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchedFrame {
    pub ert: DateTime<Utc>,
    pub vcfc: u32,
    /// Bits per second
    pub bit_rate: f64,
    pub dss_id: DssId,
}

impl From<&FrameRecord> for MatchedFrame {
    fn from(frame: &FrameRecord) -> Self {
        Self {
            ert: frame.ert,
            vcfc: frame.vcfc.unwrap_or_default(),
            bit_rate: frame.bit_rate,
            dss_id: frame.dss_id,
        }
    }
}

/// Decoded TC packet plus its reference frames, newest first, at most one
/// per station. An empty `frames` list means no reference frame was found.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeCorrelationPair {
    pub vcid: Vcid,
    pub vcfc: u32,
    pub sclk: Sclk,
    pub scet: DateTime<Utc>,
    pub ert: DateTime<Utc>,
    pub spsc: u32,
    pub encoding: EncodingType,
    pub rate_index: u8,
    pub frames: Vec<MatchedFrame>,
}

impl TimeCorrelationPair {
    pub fn has_reference_frame(&self) -> bool {
        !self.frames.is_empty()
    }
}

pub struct TimeCorrelationResolver<L, D = ReferenceTcDecoder> {
    lookup: L,
    decoder: D,
    config: TimeCorrelationConfig,
    lookback: Duration,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<L: FrameLookup> TimeCorrelationResolver<L, ReferenceTcDecoder> {
    /// Resolver using the reference body layout.
    pub fn with_reference_decoder(
        lookup: L,
        config: TimeCorrelationConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, FetchError> {
        Self::new(lookup, ReferenceTcDecoder::default(), config, diagnostics)
    }
}

impl<L: FrameLookup, D: TimeCorrelationDecoder> TimeCorrelationResolver<L, D> {
    pub fn new(
        lookup: L,
        decoder: D,
        config: TimeCorrelationConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, FetchError> {
        config.validate()?;
        let lookback = config.lookback_span()?;
        Ok(Self {
            lookup,
            decoder,
            config,
            lookback,
            diagnostics,
        })
    }

    pub fn config(&self) -> &TimeCorrelationConfig {
        &self.config
    }

    /// Resolves one TC packet.
    ///
    /// Fails only for packets of another APID or with an undecodable body.
    /// A failed frame lookup is logged and yields a pair without frames.
    pub fn resolve(&self, packet: &PacketRecord) -> Result<TimeCorrelationPair, FetchError> {
        if packet.apid != self.config.apid {
            return Err(FetchError::NotTimeCorrelation {
                apid: packet.apid,
                expected: self.config.apid,
            });
        }

        let fields = self.decoder.decode(&packet.body)?;

        let query = FrameWindowQuery {
            vcid: fields.vcid,
            vcfc: fields.vcfc,
            ert_begin: packet.ert - self.lookback,
            ert_end: packet.ert,
            limit: self.config.max_frames,
        };

        let candidates = match self.lookup.frames_in_window(&query) {
            Ok(frames) => frames,
            Err(e) => {
                self.diagnostics.warn(&format!(
                    "Frame lookup failed for TC packet SPSC={} (VCID={} VCFC={}): {}",
                    packet.spsc, fields.vcid, fields.vcfc, e
                ));
                Vec::new()
            }
        };

        Ok(TimeCorrelationPair {
            vcid: fields.vcid,
            vcfc: fields.vcfc,
            sclk: fields.sclk,
            scet: packet.scet,
            ert: packet.ert,
            spsc: packet.spsc,
            encoding: fields.encoding,
            rate_index: fields.rate_index,
            frames: select_reference_frames(candidates, &query),
        })
    }
}

/// Newest frame per DSS among the candidates that satisfy `query`.
pub fn select_reference_frames(
    mut candidates: Vec<FrameRecord>,
    query: &FrameWindowQuery,
) -> Vec<MatchedFrame> {
    candidates.retain(|frame| query.matches(frame));
    candidates.sort_by(|a, b| b.ert.cmp(&a.ert).then(b.id.cmp(&a.id)));

    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|frame| seen.insert(frame.dss_id))
        .map(MatchedFrame::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::store::MemoryFrameStore;
    use crate::timecorr::decode::TcFields;
    use chrono::TimeZone;
    use log::Level;

    const TC_APID: u16 = 500;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn tc_packet(vcid: Vcid, vcfc: u32, ert: DateTime<Utc>) -> PacketRecord {
        let body = ReferenceTcDecoder::default().encode(&TcFields {
            vcid,
            vcfc,
            sclk: Sclk::new(900, 12),
            encoding: EncodingType::ReedSolomon,
            rate_index: 3,
        });
        PacketRecord::new(TC_APID, 17, Some(vcid), ert).with_body(body)
    }

    struct FailingLookup;

    impl FrameLookup for FailingLookup {
        fn frames_in_window(&self, _: &FrameWindowQuery) -> Result<Vec<FrameRecord>, FetchError> {
            Err(FetchError::Lookup("connection reset".to_string()))
        }
    }

    fn resolver<L: FrameLookup>(lookup: L, diag: Arc<MemoryDiagnostics>) -> TimeCorrelationResolver<L> {
        TimeCorrelationResolver::with_reference_decoder(lookup, TimeCorrelationConfig::new(TC_APID), diag)
            .unwrap()
    }

    #[test]
    fn test_keeps_newest_frame_per_station() {
        let store = MemoryFrameStore::new(vec![
            FrameRecord::new(2, 4000, 14, t(-30)).with_bit_rate(1000.0),
            FrameRecord::new(2, 4000, 14, t(-10)).with_bit_rate(2000.0),
            FrameRecord::new(2, 4000, 43, t(-20)),
            FrameRecord::new(2, 4001, 43, t(-5)),
            FrameRecord::new(3, 4000, 43, t(-5)),
        ]);
        let diag = Arc::new(MemoryDiagnostics::new());

        let pair = resolver(store, diag).resolve(&tc_packet(2, 4000, t(0))).unwrap();

        assert_eq!(pair.frames.len(), 2);
        assert_eq!(pair.frames[0].dss_id, 14);
        assert_eq!(pair.frames[0].ert, t(-10));
        assert_eq!(pair.frames[0].bit_rate, 2000.0);
        assert_eq!(pair.frames[1].dss_id, 43);
        assert_eq!(pair.frames[1].ert, t(-20));
        assert_eq!(pair.sclk, Sclk::new(900, 12));
        assert_eq!(pair.encoding, EncodingType::ReedSolomon);
        assert_eq!(pair.spsc, 17);
    }

    #[test]
    fn test_frame_older_than_lookback_is_excluded() {
        let store = MemoryFrameStore::new(vec![FrameRecord::new(2, 4000, 14, t(-3601))]);
        let diag = Arc::new(MemoryDiagnostics::new());

        let pair = resolver(store, diag).resolve(&tc_packet(2, 4000, t(0))).unwrap();
        assert!(!pair.has_reference_frame());
    }

    #[test]
    fn test_frame_after_packet_is_excluded() {
        let store = MemoryFrameStore::new(vec![FrameRecord::new(2, 4000, 14, t(1))]);
        let diag = Arc::new(MemoryDiagnostics::new());

        let pair = resolver(store, diag).resolve(&tc_packet(2, 4000, t(0))).unwrap();
        assert!(pair.frames.is_empty());
    }

    #[test]
    fn test_lookup_failure_warns_and_yields_no_frame() {
        let diag = Arc::new(MemoryDiagnostics::new());
        let resolver = resolver(FailingLookup, diag.clone());

        let pair = resolver.resolve(&tc_packet(2, 4000, t(0))).unwrap();
        assert!(pair.frames.is_empty());
        assert!(diag.contains(Level::Warn, "connection reset"));
    }

    #[test]
    fn test_rejects_other_apid() {
        let diag = Arc::new(MemoryDiagnostics::new());
        let mut packet = tc_packet(2, 4000, t(0));
        packet.apid = 7;

        let err = resolver(MemoryFrameStore::default(), diag).resolve(&packet).unwrap_err();
        assert!(matches!(err, FetchError::NotTimeCorrelation { apid: 7, expected: TC_APID }));
    }

    #[test]
    fn test_short_body_fails_decode() {
        let diag = Arc::new(MemoryDiagnostics::new());
        let packet = PacketRecord::new(TC_APID, 1, None, t(0)).with_body(vec![0; 8]);

        let err = resolver(MemoryFrameStore::default(), diag).resolve(&packet).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_select_discards_rows_outside_window() {
        let query = FrameWindowQuery {
            vcid: 1,
            vcfc: 9,
            ert_begin: t(-100),
            ert_end: t(0),
            limit: 50,
        };
        let frames = vec![
            FrameRecord::new(1, 9, 14, t(-200)),
            FrameRecord::new(1, 9, 15, t(-50)),
            FrameRecord::new(1, 8, 16, t(-50)),
        ];

        let selected = select_reference_frames(frames, &query);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].dss_id, 15);
    }

    #[test]
    fn test_zero_frame_cap_is_rejected() {
        let mut config = TimeCorrelationConfig::new(TC_APID);
        config.max_frames = 0;
        let diag: Arc<dyn DiagnosticSink> = Arc::new(MemoryDiagnostics::new());

        assert!(TimeCorrelationResolver::with_reference_decoder(MemoryFrameStore::default(), config, diag)
            .is_err());
    }
}

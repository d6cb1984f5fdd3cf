//! Frame and packet records as read from the store.

use crate::types::{Apid, DssId, Sclk, Vcid};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A downlink transfer frame row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameRecord {
    /// Row id assigned by the store (0 before insertion)
    pub id: i64,
    pub session_id: i64,
    pub frame_type: String,
    pub relay_scid: Option<u32>,
    pub vcid: Vcid,
    /// Virtual channel frame counter; `None` when the store holds NULL
    pub vcfc: Option<u32>,
    /// Station that received the frame
    pub dss_id: DssId,
    pub ert: DateTime<Utc>,
    pub rct: DateTime<Utc>,
    /// Downlink bit rate in bits per second
    pub bit_rate: f64,
    pub fill_frame: bool,
}

impl FrameRecord {
    /// Frame with the sequence fields set and everything else defaulted.
    pub fn new(vcid: Vcid, vcfc: u32, dss_id: DssId, ert: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            session_id: 0,
            frame_type: String::new(),
            relay_scid: None,
            vcid,
            vcfc: Some(vcfc),
            dss_id,
            ert,
            rct: ert,
            bit_rate: 0.0,
            fill_frame: false,
        }
    }

    pub fn with_bit_rate(mut self, bit_rate: f64) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    pub fn with_frame_type(mut self, frame_type: impl Into<String>) -> Self {
        self.frame_type = frame_type.into();
        self
    }
}

/// A telemetry packet row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PacketRecord {
    pub id: i64,
    pub session_id: i64,
    pub apid: Apid,
    /// Source packet sequence counter
    pub spsc: u32,
    /// Virtual channel the packet was extracted from, if known
    pub vcid: Option<Vcid>,
    pub dss_id: DssId,
    pub from_sse: bool,
    pub ert: DateTime<Utc>,
    pub scet: DateTime<Utc>,
    pub rct: DateTime<Utc>,
    pub sclk: Sclk,
    /// Full packet bytes, primary header included. Empty unless requested.
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl PacketRecord {
    pub fn new(apid: Apid, spsc: u32, vcid: Option<Vcid>, ert: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            session_id: 0,
            apid,
            spsc,
            vcid,
            dss_id: 0,
            from_sse: false,
            ert,
            scet: ert,
            rct: ert,
            sclk: Sclk::default(),
            body: Vec::new(),
        }
    }

    pub fn with_times(mut self, scet: DateTime<Utc>, sclk: Sclk) -> Self {
        self.scet = scet;
        self.sclk = sclk;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

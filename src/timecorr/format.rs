//! Rendering of resolved time-correlation pairs.

use super::resolver::{MatchedFrame, TimeCorrelationPair};
use crate::error::FetchError;
use crate::report::SummarySink;
use crate::types::{format_ert, format_scet};
use std::io::Write;
use std::str::FromStr;

/// Marker in the frame ERT column of TC file rows without a frame.
pub const NO_REFERENCE_FRAME: &str = "NO_REFERENCE_FRAME";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TcOutputFormat {
    /// Human-readable packet and frame lines
    #[default]
    Diagnostic,
    /// Fixed-column time correlation file
    TcFile,
}

impl FromStr for TcOutputFormat {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "diagnostic" | "text" => Ok(TcOutputFormat::Diagnostic),
            "tc-file" | "tcfile" => Ok(TcOutputFormat::TcFile),
            other => Err(FetchError::InvalidConfig(format!(
                "unknown time correlation format '{}'",
                other
            ))),
        }
    }
}

pub fn tc_file_header() -> String {
    format!(
        "{:>17} {:>23} {:>25} {:>4} {:>4} {:>8} {:>14} {:>13} {:>4}",
        "SCLK", "SCET", "FRAME_ERT", "DSS", "VCID", "VCFC", "BIT_RATE", "ENCODING", "RATE"
    )
}

/// One TC file row per matched frame, or a single marker row.
pub fn tc_file_rows(pair: &TimeCorrelationPair) -> Vec<String> {
    let sclk = pair.sclk.to_string();
    let scet = format_scet(&pair.scet);
    let encoding = pair.encoding.to_string();

    if pair.frames.is_empty() {
        return vec![format!(
            "{:>17} {:>23} {:>25} {:>4} {:>4} {:>8} {:>14} {:>13} {:>4}",
            sclk, scet, NO_REFERENCE_FRAME, "-", pair.vcid, pair.vcfc, "-", encoding, pair.rate_index
        )];
    }

    pair.frames
        .iter()
        .map(|frame| {
            format!(
                "{:>17} {:>23} {:>25} {:>4} {:>4} {:>8} {:>14.3} {:>13} {:>4}",
                sclk,
                scet,
                format_ert(&frame.ert),
                frame.dss_id,
                pair.vcid,
                frame.vcfc,
                frame.bit_rate,
                encoding,
                pair.rate_index
            )
        })
        .collect()
}

pub fn diagnostic_lines(pair: &TimeCorrelationPair) -> Vec<String> {
    let mut lines = vec![format!(
        "TC packet SPSC={} ERT={} SCET={} SCLK={} VCID={} VCFC={} encoding={} rate_index={}",
        pair.spsc,
        format_ert(&pair.ert),
        format_scet(&pair.scet),
        pair.sclk,
        pair.vcid,
        pair.vcfc,
        pair.encoding,
        pair.rate_index
    )];

    if pair.frames.is_empty() {
        lines.push("    No reference frame found".to_string());
    } else {
        lines.extend(pair.frames.iter().map(frame_line));
    }
    lines
}

fn frame_line(frame: &MatchedFrame) -> String {
    format!(
        "    Frame ERT={} DSS={} VCFC={} bit_rate={:.3}",
        format_ert(&frame.ert),
        frame.dss_id,
        frame.vcfc,
        frame.bit_rate
    )
}

/// Writes resolved pairs in one of the two TC formats.
#[derive(Debug)]
pub struct TimeCorrelationReport<W: Write> {
    out: W,
    format: TcOutputFormat,
}

impl<W: Write> TimeCorrelationReport<W> {
    pub fn new(format: TcOutputFormat, out: W) -> Self {
        Self { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SummarySink<TimeCorrelationPair> for TimeCorrelationReport<W> {
    fn begin(&mut self) -> Result<(), FetchError> {
        if self.format == TcOutputFormat::TcFile {
            writeln!(self.out, "{}", tc_file_header())?;
        }
        Ok(())
    }

    fn emit(&mut self, pair: &TimeCorrelationPair) -> Result<(), FetchError> {
        let lines = match self.format {
            TcOutputFormat::Diagnostic => diagnostic_lines(pair),
            TcOutputFormat::TcFile => tc_file_rows(pair),
        };
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        self.out.flush()?;
        Ok(())
    }
}

//! # Report Sinks
//!
//! Summaries leave the drivers through a [`SummarySink`]. The fixed-column
//! text layout of each summary type lives next to the type (see
//! [`TextLayout`]); this module only decides where the lines go and in which
//! encoding.

pub mod output;

pub use output::{OutputTarget, ReportWriter};

use crate::error::FetchError;
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;

/// Receives summaries in emission order.
///
/// `begin` is called once, before the first summary, and only if the first
/// batch of records was non-empty. `finish` is called once at the end of a
/// run whenever `begin` was called.
pub trait SummarySink<S> {
    fn begin(&mut self) -> Result<(), FetchError>;
    fn emit(&mut self, summary: &S) -> Result<(), FetchError>;
    fn finish(&mut self) -> Result<(), FetchError>;
}

impl<S, K: SummarySink<S> + ?Sized> SummarySink<S> for &mut K {
    fn begin(&mut self) -> Result<(), FetchError> {
        (**self).begin()
    }

    fn emit(&mut self, summary: &S) -> Result<(), FetchError> {
        (**self).emit(summary)
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        (**self).finish()
    }
}

/// Fixed-column text rendering of a summary type.
pub trait TextLayout {
    /// Column header printed once before the first summary.
    fn header() -> String;

    /// One summary, possibly spanning several lines, without a trailing
    /// newline.
    fn render(&self) -> String;
}

/// Encoding of summary output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(FetchError::InvalidConfig(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

/// Writes the header and each summary's text rendering.
#[derive(Debug)]
pub struct TextReport<W: Write> {
    out: W,
    summaries: usize,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W) -> Self {
        Self { out, summaries: 0 }
    }

    pub fn summaries_written(&self) -> usize {
        self.summaries
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<S: TextLayout, W: Write> SummarySink<S> for TextReport<W> {
    fn begin(&mut self) -> Result<(), FetchError> {
        writeln!(self.out, "{}", S::header())?;
        Ok(())
    }

    fn emit(&mut self, summary: &S) -> Result<(), FetchError> {
        writeln!(self.out, "{}", summary.render())?;
        self.summaries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Writes each summary as a JSON line. No header.
#[derive(Debug)]
pub struct JsonLinesReport<W: Write> {
    out: W,
    summaries: usize,
}

impl<W: Write> JsonLinesReport<W> {
    pub fn new(out: W) -> Self {
        Self { out, summaries: 0 }
    }

    pub fn summaries_written(&self) -> usize {
        self.summaries
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<S: Serialize, W: Write> SummarySink<S> for JsonLinesReport<W> {
    fn begin(&mut self) -> Result<(), FetchError> {
        Ok(())
    }

    fn emit(&mut self, summary: &S) -> Result<(), FetchError> {
        serde_json::to_writer(&mut self.out, summary)?;
        self.out.write_all(b"\n")?;
        self.summaries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Text or JSON report chosen at run time.
#[derive(Debug)]
pub enum SummaryReport<W: Write> {
    Text(TextReport<W>),
    Json(JsonLinesReport<W>),
}

impl<W: Write> SummaryReport<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        match format {
            OutputFormat::Text => SummaryReport::Text(TextReport::new(out)),
            OutputFormat::Json => SummaryReport::Json(JsonLinesReport::new(out)),
        }
    }

    pub fn into_inner(self) -> W {
        match self {
            SummaryReport::Text(report) => report.into_inner(),
            SummaryReport::Json(report) => report.into_inner(),
        }
    }
}

impl<S: TextLayout + Serialize, W: Write> SummarySink<S> for SummaryReport<W> {
    fn begin(&mut self) -> Result<(), FetchError> {
        match self {
            SummaryReport::Text(report) => SummarySink::<S>::begin(report),
            SummaryReport::Json(report) => SummarySink::<S>::begin(report),
        }
    }

    fn emit(&mut self, summary: &S) -> Result<(), FetchError> {
        match self {
            SummaryReport::Text(report) => report.emit(summary),
            SummaryReport::Json(report) => report.emit(summary),
        }
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        match self {
            SummaryReport::Text(report) => SummarySink::<S>::finish(report),
            SummaryReport::Json(report) => SummarySink::<S>::finish(report),
        }
    }
}

/// Keeps summaries in memory.
#[derive(Debug, Clone)]
pub struct CollectingSink<S> {
    pub began: bool,
    pub finished: bool,
    pub summaries: Vec<S>,
}

impl<S> Default for CollectingSink<S> {
    fn default() -> Self {
        Self {
            began: false,
            finished: false,
            summaries: Vec::new(),
        }
    }
}

impl<S> CollectingSink<S> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Clone> SummarySink<S> for CollectingSink<S> {
    fn begin(&mut self) -> Result<(), FetchError> {
        self.began = true;
        Ok(())
    }

    fn emit(&mut self, summary: &S) -> Result<(), FetchError> {
        self.summaries.push(summary.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Serialize)]
    struct Line {
        n: u32,
    }

    impl TextLayout for Line {
        fn header() -> String {
            "N".to_string()
        }

        fn render(&self) -> String {
            format!("{:>3}", self.n)
        }
    }

    #[test]
    fn test_text_report_writes_header_then_lines() {
        let mut report = TextReport::new(Vec::new());
        SummarySink::<Line>::begin(&mut report).unwrap();
        report.emit(&Line { n: 7 }).unwrap();
        SummarySink::<Line>::finish(&mut report).unwrap();

        assert_eq!(report.summaries_written(), 1);
        assert_eq!(String::from_utf8(report.into_inner()).unwrap(), "N\n  7\n");
    }

    #[test]
    fn test_json_report_writes_one_object_per_line() {
        let mut report = SummaryReport::new(OutputFormat::Json, Vec::new());
        SummarySink::<Line>::begin(&mut report).unwrap();
        report.emit(&Line { n: 1 }).unwrap();
        report.emit(&Line { n: 2 }).unwrap();

        let text = String::from_utf8(report.into_inner()).unwrap();
        assert_eq!(text, "{\"n\":1}\n{\"n\":2}\n");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}

//! # Drivers
//!
//! Pull-based batch loops that connect a [`RecordSource`] to a gap analyzer
//! or to the time-correlation resolver, and their results to a
//! [`SummarySink`].
//!
//! Both loops are synchronous and single threaded. The shutdown flag is
//! checked before every batch and every record. However a run ends
//! (exhausted, interrupted or failed), open gap runs are flushed, the sink is
//! finished and the source is closed before the first error is returned.

use crate::diagnostics::DiagnosticSink;
use crate::error::FetchError;
use crate::gap::{GapAnalyzer, GapDecision};
use crate::report::SummarySink;
use crate::shutdown::ShutdownFlag;
use crate::store::{FrameLookup, PacketRecord, RecordSource};
use crate::timecorr::{TimeCorrelationDecoder, TimeCorrelationPair, TimeCorrelationResolver};
use serde::Serialize;

/// Outcome of a gap analysis run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Records pulled from the source
    pub records: u64,
    /// Records without sequence fields
    pub skipped: u64,
    /// Discontinuities detected
    pub gaps: u64,
    /// Summaries written to the sink
    pub summaries: u64,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
}

/// Outcome of a time-correlation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TcRunReport {
    pub packets: u64,
    /// Pairs with at least one reference frame
    pub resolved: u64,
    /// Pairs reported without a reference frame
    pub unmatched: u64,
    /// Packets that could not be decoded
    pub skipped: u64,
    pub interrupted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopEnd {
    Exhausted,
    Interrupted,
}

struct LoopContext<'a> {
    shutdown: &'a ShutdownFlag,
    diagnostics: &'a dyn DiagnosticSink,
    noun: &'static str,
}

/// Pulls batches until the source is exhausted or shutdown is requested.
///
/// `begin` is called on the sink right before the first record of a
/// non-empty first batch; `began` records whether that happened.
fn pump<R, S, K, F>(
    source: &mut R,
    sink: &mut K,
    began: &mut bool,
    ctx: &LoopContext<'_>,
    mut each: F,
) -> Result<LoopEnd, FetchError>
where
    R: RecordSource,
    K: SummarySink<S>,
    F: FnMut(&R::Record, &mut K) -> Result<(), FetchError>,
{
    let mut first_batch = true;
    loop {
        if ctx.shutdown.is_requested() {
            return Ok(LoopEnd::Interrupted);
        }

        let batch = source.next_batch()?;
        if batch.is_empty() {
            if first_batch {
                ctx.diagnostics.info(&format!(
                    "There were no {} found that matched your query.",
                    ctx.noun
                ));
            }
            return Ok(LoopEnd::Exhausted);
        }

        if first_batch {
            first_batch = false;
            SummarySink::<S>::begin(sink)?;
            *began = true;
        }
        ctx.diagnostics
            .debug(&format!("Retrieved {} records.", batch.len()));

        for record in &batch {
            if ctx.shutdown.is_requested() {
                return Ok(LoopEnd::Interrupted);
            }
            each(record, sink)?;
        }
    }
}

/// Wraps up a run: finishes the sink, closes the source, reports the first
/// error.
fn conclude<R, S, K>(
    source: &mut R,
    sink: &mut K,
    began: bool,
    mut result: Result<LoopEnd, FetchError>,
    ctx: &LoopContext<'_>,
) -> Result<LoopEnd, FetchError>
where
    R: RecordSource,
    K: SummarySink<S>,
{
    if began {
        if let Err(e) = SummarySink::<S>::finish(sink) {
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    source.close();

    match &result {
        Ok(LoopEnd::Interrupted) => ctx
            .diagnostics
            .warn(&format!("Shutdown requested; {} output may be partial", ctx.noun)),
        Ok(LoopEnd::Exhausted) => {}
        Err(FetchError::Io(e)) => ctx
            .diagnostics
            .error(&format!("Problem encountered while writing output: {}", e)),
        Err(e) => ctx
            .diagnostics
            .error(&format!("Problem encountered while retrieving records: {}", e)),
    }
    result
}

/// Runs gap detection over every record of `source`.
///
/// # Arguments
/// - `source`: ordered records; gap detection relies on the source order
/// - `analyzer`: frame or packet tracker
/// - `sink`: receives each closed run as soon as its gap is seen, then every
///   open run at the end
///
/// # Returns
/// Run counters, or the first source or sink error. On error the summaries
/// produced so far, including the flushed open runs, have already been
/// written.
pub fn run_gap_analysis<R, A, K>(
    source: &mut R,
    analyzer: &mut A,
    sink: &mut K,
    shutdown: &ShutdownFlag,
    diagnostics: &dyn DiagnosticSink,
) -> Result<RunReport, FetchError>
where
    R: RecordSource<Record = A::Record>,
    A: GapAnalyzer,
    K: SummarySink<A::Summary>,
{
    let ctx = LoopContext {
        shutdown,
        diagnostics,
        noun: analyzer.record_noun(),
    };
    let mut report = RunReport::default();
    let mut began = false;

    let mut result = pump::<_, A::Summary, _, _>(source, sink, &mut began, &ctx, |record, sink| {
        report.records += 1;
        match analyzer.observe(record) {
            None => report.skipped += 1,
            Some(GapDecision::Continued) => {}
            Some(GapDecision::GapStarted(closed)) => {
                report.gaps += 1;
                if let Some(summary) = closed {
                    sink.emit(&summary)?;
                    report.summaries += 1;
                }
            }
        }
        Ok(())
    });

    if began {
        for summary in analyzer.flush() {
            if let Err(e) = sink.emit(&summary) {
                if result.is_ok() {
                    result = Err(e);
                }
                break;
            }
            report.summaries += 1;
        }
    }

    if report.skipped > 0 {
        diagnostics.debug(&format!(
            "Skipped {} {} without sequence counters",
            report.skipped, ctx.noun
        ));
    }

    let end = conclude::<_, A::Summary, _>(source, sink, began, result, &ctx)?;
    report.interrupted = end == LoopEnd::Interrupted;
    Ok(report)
}

/// Resolves every TC packet of `source` and writes the pairs to `sink`.
///
/// Packets that cannot be decoded (or carry another APID) are skipped with a
/// warning; the run only fails on source or sink errors.
pub fn run_time_correlation<R, L, D, K>(
    source: &mut R,
    resolver: &TimeCorrelationResolver<L, D>,
    sink: &mut K,
    shutdown: &ShutdownFlag,
    diagnostics: &dyn DiagnosticSink,
) -> Result<TcRunReport, FetchError>
where
    R: RecordSource<Record = PacketRecord>,
    L: FrameLookup,
    D: TimeCorrelationDecoder,
    K: SummarySink<TimeCorrelationPair>,
{
    let ctx = LoopContext {
        shutdown,
        diagnostics,
        noun: "time correlation packets",
    };
    let mut report = TcRunReport::default();
    let mut began = false;

    let result = pump::<_, TimeCorrelationPair, _, _>(source, sink, &mut began, &ctx, |packet, sink| {
        report.packets += 1;
        match resolver.resolve(packet) {
            Ok(pair) => {
                if pair.has_reference_frame() {
                    report.resolved += 1;
                } else {
                    report.unmatched += 1;
                }
                sink.emit(&pair)
            }
            Err(e) if e.is_per_packet() => {
                report.skipped += 1;
                diagnostics.warn(&format!("Skipping packet SPSC={}: {}", packet.spsc, e));
                Ok(())
            }
            Err(e) => Err(e),
        }
    });

    let end = conclude::<_, TimeCorrelationPair, _>(source, sink, began, result, &ctx)?;
    report.interrupted = end == LoopEnd::Interrupted;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::gap::{FrameGapTracker, FrameRange};
    use crate::report::CollectingSink;
    use crate::store::{FrameRecord, VecSource};
    use chrono::{DateTime, TimeZone, Utc};
    use log::Level;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn frames(vcfcs: &[u32]) -> Vec<FrameRecord> {
        vcfcs
            .iter()
            .enumerate()
            .map(|(i, vcfc)| FrameRecord::new(0, *vcfc, 14, t(i as i64)))
            .collect()
    }

    #[test]
    fn test_gap_summaries_stream_then_flush() {
        let mut source = VecSource::from_records(frames(&[5, 6, 9]), 2);
        let mut sink = CollectingSink::<FrameRange>::new();
        let diag = MemoryDiagnostics::new();

        let report = run_gap_analysis(
            &mut source,
            &mut FrameGapTracker::new(),
            &mut sink,
            &ShutdownFlag::new(),
            &diag,
        )
        .unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.gaps, 1);
        assert_eq!(report.summaries, 2);
        assert!(!report.interrupted);
        assert!(sink.began && sink.finished);
        assert!(source.is_closed());
        assert_eq!(diag.messages_at(Level::Debug)[0], "Retrieved 2 records.");
    }

    #[test]
    fn test_empty_source_reports_no_matches() {
        let mut source = VecSource::<FrameRecord>::from_records(Vec::new(), 10);
        let mut sink = CollectingSink::<FrameRange>::new();
        let diag = MemoryDiagnostics::new();

        let report = run_gap_analysis(
            &mut source,
            &mut FrameGapTracker::new(),
            &mut sink,
            &ShutdownFlag::new(),
            &diag,
        )
        .unwrap();

        assert_eq!(report, RunReport::default());
        assert!(!sink.began);
        assert!(diag.contains(Level::Info, "There were no frames found that matched your query."));
    }

    #[test]
    fn test_shutdown_before_start_is_interrupted() {
        let mut source = VecSource::from_records(frames(&[1, 2]), 10);
        let mut sink = CollectingSink::<FrameRange>::new();
        let shutdown = ShutdownFlag::new();
        shutdown.request();

        let report = run_gap_analysis(
            &mut source,
            &mut FrameGapTracker::new(),
            &mut sink,
            &shutdown,
            &MemoryDiagnostics::new(),
        )
        .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.records, 0);
        assert!(sink.summaries.is_empty());
        assert!(source.is_closed());
    }
}

//! # Packet Gap Report
//!
//! Lists runs of consecutive source packet sequence counters for one APID,
//! grouped by VCID.
//!
//! Usage:
//!   chill_packet_gaps --apid N [--time-type ert|scet|rct|sclk]
//!                     [--begin-time T] [--end-time T] [--packet-types fsw|sse|all]

use clap::Parser;
use gds_fetch::cli::{exit_code, run_with_shutdown, PacketGapsCli};
use gds_fetch::diagnostics::{init_console_logger, LogDiagnostics};
use gds_fetch::driver::{run_gap_analysis, RunReport};
use gds_fetch::error::FetchError;
use gds_fetch::gap::PacketGapTracker;
use gds_fetch::report::SummaryReport;
use gds_fetch::store::SqliteStore;
use log::{error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = PacketGapsCli::parse();

    let config = match cli.db.fetch_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return exit_code::<()>(&Err(e));
        }
    };
    if let Err(e) = init_console_logger(config.log_level) {
        eprintln!("{}", e);
    }

    let apid = cli.apid;
    let result = run_with_shutdown(move |shutdown| -> Result<RunReport, FetchError> {
        let query = cli.query()?;
        let store = SqliteStore::open(&config.database_path)?;
        let mut source = store.packet_source(&query, config.batch_size)?;

        let mut report = SummaryReport::new(cli.format.into(), cli.output.target().open()?);
        let diagnostics = LogDiagnostics::new("chill_packet_gaps");

        let run = run_gap_analysis(
            &mut source,
            &mut PacketGapTracker::new(),
            &mut report,
            &shutdown,
            &diagnostics,
        );
        let closed = report.into_inner().close();
        let run = run?;
        closed?;
        Ok(run)
    })
    .await;

    match &result {
        Ok(run) => info!(
            "Processed {} packets for APID {}: {} gaps, {} ranges reported",
            run.records, apid, run.gaps, run.summaries
        ),
        Err(e) => error!("chill_packet_gaps failed: {}", e),
    }
    exit_code(&result)
}

//! # Time Correlation Report
//!
//! Pairs each time-correlation packet with the downlink frame(s) that
//! carried it, one frame per ground station.
//!
//! Usage:
//!   chill_time_correlation --apid N [--begin-time T] [--end-time T] [--tc-file]
//!                          [--lookback-secs 3600] [--max-frames 50]

use clap::Parser;
use gds_fetch::cli::{exit_code, run_with_shutdown, TimeCorrelationCli};
use gds_fetch::diagnostics::{init_console_logger, DiagnosticSink, LogDiagnostics};
use gds_fetch::driver::{run_time_correlation, TcRunReport};
use gds_fetch::error::FetchError;
use gds_fetch::store::SqliteStore;
use gds_fetch::timecorr::{TimeCorrelationReport, TimeCorrelationResolver};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

const LOG_TARGET: &str = "chill_time_correlation";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = TimeCorrelationCli::parse();

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

    let result = run_with_shutdown(move |shutdown| -> Result<TcRunReport, FetchError> {
        let query = cli.query()?;
        let tc_config = cli.tc_config()?;
        let store = SqliteStore::open(&config.database_path)?;
        let diagnostics: Arc<dyn DiagnosticSink> = Arc::new(LogDiagnostics::new(LOG_TARGET));

        let resolver = TimeCorrelationResolver::with_reference_decoder(
            &store,
            tc_config,
            Arc::clone(&diagnostics),
        )?;
        let mut source = store.packet_source(&query, config.batch_size)?;
        let mut report = TimeCorrelationReport::new(cli.format(), cli.output.target().open()?);

        let run = run_time_correlation(
            &mut source,
            &resolver,
            &mut report,
            &shutdown,
            diagnostics.as_ref(),
        );
        let closed = report.into_inner().close();
        let run = run?;
        closed?;
        Ok(run)
    })
    .await;

    match &result {
        Ok(run) => info!(
            "Processed {} TC packets: {} resolved, {} without reference frame, {} skipped",
            run.packets, run.resolved, run.unmatched, run.skipped
        ),
        Err(e) => error!("chill_time_correlation failed: {}", e),
    }
    exit_code(&result)
}

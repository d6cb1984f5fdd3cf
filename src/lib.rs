//! # gds-fetch
//!
//! Gap analysis and time correlation over the frame and packet records of a
//! ground data system database.
//!
//! - [`gap`]: per-key sequence run tracking for frames (VCFC) and packets
//!   (SPSC)
//! - [`timecorr`]: resolves time-correlation packets to the downlink frames
//!   that carried them
//! - [`driver`]: batch loops that connect a [`store::RecordSource`] to a
//!   tracker or resolver and a [`report::SummarySink`]
//!
//! The `chill_frame_gaps`, `chill_packet_gaps` and `chill_time_correlation`
//! binaries wrap the drivers with argument parsing, the SQLite store and
//! Ctrl-C handling.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod gap;
pub mod report;
pub mod shutdown;
pub mod store;
pub mod timecorr;
pub mod types;

pub use config::{FetchConfig, TimeCorrelationConfig};
pub use diagnostics::{DiagnosticSink, LogDiagnostics, MemoryDiagnostics};
pub use driver::{run_gap_analysis, run_time_correlation, RunReport, TcRunReport};
pub use error::FetchError;
pub use gap::{FrameGapTracker, GapAnalyzer, GapDecision, PacketGapTracker, RangeSummary, SequenceGapTracker};
pub use shutdown::ShutdownFlag;
pub use timecorr::{TimeCorrelationPair, TimeCorrelationResolver};

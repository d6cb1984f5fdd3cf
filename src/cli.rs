//! Command-line arguments shared by the fetch binaries, and the runtime glue
//! that runs a blocking driver under Ctrl-C handling.

use crate::config::{FetchConfig, TimeCorrelationConfig, ENV_TC_APID};
use crate::error::FetchError;
use crate::report::{OutputFormat, OutputTarget};
use crate::shutdown::ShutdownFlag;
use crate::store::{
    FrameOrder, FrameQuery, PacketOrder, PacketQuery, PacketSelection, PacketTimeWindow,
    SclkRange, TimeRange,
};
use crate::timecorr::TcOutputFormat;
use crate::types::{parse_sclk, parse_time, Apid, DssId, Vcid};
use clap::{Args, Parser, ValueEnum};
use log::LevelFilter;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_OTHER_ERROR: u8 = 1;

/// Database and logging options.
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// SQLite database file (overrides GDS_DATABASE_PATH)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Records fetched per batch (overrides GDS_FETCH_BATCH_SIZE)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Console log level: error, warn, info, debug, trace (overrides GDS_LOG_LEVEL)
    #[arg(long)]
    pub log_level: Option<LevelFilter>,
}

impl DbArgs {
    /// Environment configuration with command-line overrides applied.
    pub fn fetch_config(&self) -> Result<FetchConfig, FetchError> {
        let mut config = FetchConfig::from_env()?;
        if let Some(ref path) = self.database {
            config.database_path = path.clone();
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Query time bounds, kept as text until the time type is known.
#[derive(Args, Debug, Clone, Default)]
pub struct TimeArgs {
    /// Start of the query window (YYYY-DOYTHH:MM:SS[.fff], or SCLK coarse[.fine])
    #[arg(long)]
    pub begin_time: Option<String>,

    /// End of the query window, inclusive
    #[arg(long)]
    pub end_time: Option<String>,
}

impl TimeArgs {
    pub fn time_range(&self) -> Result<TimeRange, FetchError> {
        let range = TimeRange {
            begin: self.begin_time.as_deref().map(parse_time).transpose()?,
            end: self.end_time.as_deref().map(parse_time).transpose()?,
        };
        if let (Some(begin), Some(end)) = (range.begin, range.end) {
            if begin > end {
                return Err(FetchError::InvalidTime(
                    "begin time is after end time".to_string(),
                ));
            }
        }
        Ok(range)
    }

    pub fn sclk_range(&self) -> Result<SclkRange, FetchError> {
        let range = SclkRange {
            begin: self.begin_time.as_deref().map(parse_sclk).transpose()?,
            end: self.end_time.as_deref().map(parse_sclk).transpose()?,
        };
        if let (Some(begin), Some(end)) = (range.begin, range.end) {
            if begin > end {
                return Err(FetchError::InvalidTime(
                    "begin SCLK is after end SCLK".to_string(),
                ));
            }
        }
        Ok(range)
    }
}

/// Output destination options.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write to this file instead of stdout (gzip when it ends in .gz)
    #[arg(long, conflicts_with = "socket")]
    pub output_file: Option<PathBuf>,

    /// Write to a TCP socket, host:port
    #[arg(long)]
    pub socket: Option<String>,
}

impl OutputArgs {
    pub fn target(&self) -> OutputTarget {
        match (&self.output_file, &self.socket) {
            (Some(path), _) => OutputTarget::File(path.clone()),
            (None, Some(addr)) => OutputTarget::Socket(addr.clone()),
            (None, None) => OutputTarget::Stdout,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Fixed-column text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameOrderArg {
    #[default]
    Ert,
    Rct,
    /// Store insertion order
    #[value(name = "none")]
    Unordered,
}

impl From<FrameOrderArg> for FrameOrder {
    fn from(arg: FrameOrderArg) -> Self {
        match arg {
            FrameOrderArg::Ert => FrameOrder::Ert,
            FrameOrderArg::Rct => FrameOrder::Rct,
            FrameOrderArg::Unordered => FrameOrder::None,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "chill_frame_gaps")]
#[command(about = "Report runs of consecutive frames and the gaps between them", long_about = None)]
pub struct FrameGapsCli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub time: TimeArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Output encoding
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,

    /// Only frames of this type
    #[arg(long)]
    pub frame_type: Option<String>,

    /// Only frames relayed through this spacecraft
    #[arg(long)]
    pub relay_scid: Option<u32>,

    /// Only these virtual channels (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub vcid: Vec<Vcid>,

    /// Only frames received by these stations (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub dss_id: Vec<DssId>,

    /// Record ordering; gap detection assumes ERT order
    #[arg(long, value_enum, default_value_t = FrameOrderArg::Ert)]
    pub order_by: FrameOrderArg,
}

impl FrameGapsCli {
    pub fn query(&self) -> Result<FrameQuery, FetchError> {
        Ok(FrameQuery {
            ert: self.time.time_range()?,
            frame_type: self.frame_type.clone(),
            relay_scid: self.relay_scid,
            vcids: id_set(&self.vcid),
            dss_ids: id_set(&self.dss_id),
            order: self.order_by.into(),
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeTypeArg {
    #[default]
    Ert,
    Scet,
    Rct,
    Sclk,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketOrderArg {
    Ert,
    Scet,
    Rct,
    Sclk,
    Spsc,
    #[value(name = "none")]
    Unordered,
}

impl From<PacketOrderArg> for PacketOrder {
    fn from(arg: PacketOrderArg) -> Self {
        match arg {
            PacketOrderArg::Ert => PacketOrder::Ert,
            PacketOrderArg::Scet => PacketOrder::Scet,
            PacketOrderArg::Rct => PacketOrder::Rct,
            PacketOrderArg::Sclk => PacketOrder::Sclk,
            PacketOrderArg::Spsc => PacketOrder::Spsc,
            PacketOrderArg::Unordered => PacketOrder::None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PacketTypesArg {
    #[default]
    All,
    /// Flight software packets only
    Fsw,
    /// Support equipment packets only
    Sse,
}

impl From<PacketTypesArg> for PacketSelection {
    fn from(arg: PacketTypesArg) -> Self {
        match arg {
            PacketTypesArg::All => PacketSelection::All,
            PacketTypesArg::Fsw => PacketSelection::FswOnly,
            PacketTypesArg::Sse => PacketSelection::SseOnly,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "chill_packet_gaps")]
#[command(about = "Report runs of consecutive packet sequence counters for one APID", long_about = None)]
pub struct PacketGapsCli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub time: TimeArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,

    /// Packet APID to analyze
    #[arg(long)]
    pub apid: Apid,

    /// Time domain of --begin-time/--end-time
    #[arg(long, value_enum, default_value_t = TimeTypeArg::Ert)]
    pub time_type: TimeTypeArg,

    #[arg(long, value_enum, default_value_t = PacketTypesArg::All)]
    pub packet_types: PacketTypesArg,

    /// Only these virtual channels (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub vcid: Vec<Vcid>,

    /// Only packets received by these stations (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub dss_id: Vec<DssId>,

    /// Record ordering; defaults to the time type
    #[arg(long, value_enum)]
    pub order_by: Option<PacketOrderArg>,
}

impl PacketGapsCli {
    pub fn query(&self) -> Result<PacketQuery, FetchError> {
        let window = match self.time_type {
            TimeTypeArg::Ert => PacketTimeWindow::Ert(self.time.time_range()?),
            TimeTypeArg::Scet => PacketTimeWindow::Scet(self.time.time_range()?),
            TimeTypeArg::Rct => PacketTimeWindow::Rct(self.time.time_range()?),
            TimeTypeArg::Sclk => PacketTimeWindow::Sclk(self.time.sclk_range()?),
        };
        Ok(PacketQuery {
            window,
            apid: Some(self.apid),
            vcids: id_set(&self.vcid),
            dss_ids: id_set(&self.dss_id),
            selection: self.packet_types.into(),
            order: self.order_by.map(PacketOrder::from),
            include_body: false,
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "chill_time_correlation")]
#[command(about = "Match time correlation packets to the frames that carried them", long_about = None)]
pub struct TimeCorrelationCli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub time: TimeArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// APID of the time correlation packets
    #[arg(long, env = ENV_TC_APID)]
    pub apid: Apid,

    /// Write the fixed-column time correlation file format
    #[arg(long)]
    pub tc_file: bool,

    /// Frame search lookback before each packet ERT, in seconds
    #[arg(long)]
    pub lookback_secs: Option<u64>,

    /// Maximum candidate frames per packet
    #[arg(long)]
    pub max_frames: Option<usize>,

    /// Only packets received by these stations (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub dss_id: Vec<DssId>,
}

impl TimeCorrelationCli {
    pub fn query(&self) -> Result<PacketQuery, FetchError> {
        Ok(PacketQuery {
            window: PacketTimeWindow::Ert(self.time.time_range()?),
            apid: Some(self.apid),
            dss_ids: id_set(&self.dss_id),
            include_body: true,
            ..Default::default()
        })
    }

    pub fn tc_config(&self) -> Result<TimeCorrelationConfig, FetchError> {
        let mut config = TimeCorrelationConfig::new(self.apid);
        if let Some(secs) = self.lookback_secs {
            config.lookback = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_frames {
            config.max_frames = max;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn format(&self) -> TcOutputFormat {
        if self.tc_file {
            TcOutputFormat::TcFile
        } else {
            TcOutputFormat::Diagnostic
        }
    }
}

fn id_set(ids: &[u32]) -> Option<BTreeSet<u32>> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.iter().copied().collect())
    }
}

/// Runs `work` on a blocking thread while a Ctrl-C listener can raise the
/// shutdown flag it receives.
pub async fn run_with_shutdown<T, F>(work: F) -> Result<T, FetchError>
where
    T: Send + 'static,
    F: FnOnce(ShutdownFlag) -> Result<T, FetchError> + Send + 'static,
{
    let shutdown = ShutdownFlag::new();
    let listener = shutdown.listen_for_ctrl_c();

    let worker_flag = shutdown.clone();
    let joined = tokio::task::spawn_blocking(move || work(worker_flag)).await;
    listener.abort();

    joined.map_err(|e| FetchError::Worker(e.to_string()))?
}

/// Exit status for a finished run: 0 on success (interrupted runs included),
/// 1 otherwise.
pub fn exit_status<T>(result: &Result<T, FetchError>) -> u8 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_OTHER_ERROR,
    }
}

pub fn exit_code<T>(result: &Result<T, FetchError>) -> ExitCode {
    ExitCode::from(exit_status(result))
}

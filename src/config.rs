//! Runtime configuration for the fetch tools.
//!
//! Defaults can be overridden from the environment; command-line flags
//! override both.

use crate::error::FetchError;
use crate::types::Apid;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the SQLite database.
pub const ENV_DATABASE_PATH: &str = "GDS_DATABASE_PATH";
/// Environment variable for the fetch batch size.
pub const ENV_BATCH_SIZE: &str = "GDS_FETCH_BATCH_SIZE";
/// Environment variable for the console log level.
pub const ENV_LOG_LEVEL: &str = "GDS_LOG_LEVEL";
/// Environment variable for the time-correlation APID.
pub const ENV_TC_APID: &str = "GDS_TC_APID";

/// Frame lookback used when pairing a TC packet with its frame.
pub const DEFAULT_TC_LOOKBACK: Duration = Duration::from_secs(60 * 60);

/// Frame rows examined per TC packet.
pub const DEFAULT_TC_MAX_FRAMES: usize = 50;

/// Database and batching configuration shared by every fetch app.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Path to the SQLite database
    pub database_path: PathBuf,

    /// Records pulled from the store per batch
    pub batch_size: usize,

    /// Maximum console log level
    pub log_level: LevelFilter,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            database_path: PathBuf::from("./var/data/gds.db"),
            batch_size: 1000,
            log_level: LevelFilter::Info,
        }
    }
}

impl FetchConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, FetchError> {
        let mut config = FetchConfig::default();

        if let Ok(path) = std::env::var(ENV_DATABASE_PATH) {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(size) = std::env::var(ENV_BATCH_SIZE) {
            config.batch_size = size.trim().parse().map_err(|_| {
                FetchError::InvalidConfig(format!("{} must be an integer, got '{}'", ENV_BATCH_SIZE, size))
            })?;
        }

        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            config.log_level = level.trim().parse().map_err(|_| {
                FetchError::InvalidConfig(format!("{} is not a log level: '{}'", ENV_LOG_LEVEL, level))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.batch_size == 0 {
            return Err(FetchError::InvalidConfig(
                "batch size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Time-correlation resolution settings.
#[derive(Debug, Clone)]
pub struct TimeCorrelationConfig {
    /// APID of the time-correlation packets
    pub apid: Apid,

    /// How far before the packet ERT to search for the carrying frame
    pub lookback: Duration,

    /// Cap on candidate frames fetched per packet
    pub max_frames: usize,
}

impl TimeCorrelationConfig {
    pub fn new(apid: Apid) -> Self {
        TimeCorrelationConfig {
            apid,
            lookback: DEFAULT_TC_LOOKBACK,
            max_frames: DEFAULT_TC_MAX_FRAMES,
        }
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.lookback.is_zero() {
            return Err(FetchError::InvalidConfig(
                "time correlation lookback must be greater than zero".to_string(),
            ));
        }
        if self.max_frames == 0 {
            return Err(FetchError::InvalidConfig(
                "time correlation frame cap must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Lookback as a chrono duration for window arithmetic.
    pub fn lookback_span(&self) -> Result<chrono::Duration, FetchError> {
        chrono::Duration::from_std(self.lookback)
            .map_err(|e| FetchError::InvalidConfig(format!("lookback out of range: {}", e)))
    }
}

//! Mission time domains shared by the store, the trackers and the reports.
//!
//! ERT, SCET and RCT are carried as `DateTime<Utc>` with nanosecond
//! resolution and persisted as signed nanoseconds since the Unix epoch.
//! SCLK is a coarse/fine pair with a 16-bit fine field.

use crate::error::FetchError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual channel identifier.
pub type Vcid = u32;

/// Deep-space-station identifier.
pub type DssId = u32;

/// Application process identifier.
pub type Apid = u16;

/// Number of fine ticks per coarse SCLK tick.
pub const SCLK_FINE_MODULUS: u64 = 1 << 16;

/// Spacecraft clock value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sclk {
    pub coarse: u32,
    pub fine: u16,
}

impl Sclk {
    pub fn new(coarse: u32, fine: u16) -> Self {
        Self { coarse, fine }
    }

    /// Single monotonic tick count (`coarse * 2^16 + fine`).
    #[inline]
    pub fn ticks(&self) -> u64 {
        u64::from(self.coarse) * SCLK_FINE_MODULUS + u64::from(self.fine)
    }
}

impl fmt::Display for Sclk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}.{:05}", self.coarse, self.fine)
    }
}

/// Converts stored nanoseconds into a UTC timestamp.
pub fn from_unix_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

/// Converts a UTC timestamp into stored nanoseconds.
///
/// Fails outside the representable range (years 1677 through 2262).
pub fn to_unix_nanos(time: &DateTime<Utc>) -> Result<i64, FetchError> {
    time.timestamp_nanos_opt()
        .ok_or_else(|| FetchError::InvalidTime(format!("{} is outside the storable range", time)))
}

/// ERT in day-of-year form with microseconds, e.g. `2024-123T04:05:06.123456`.
pub fn format_ert(time: &DateTime<Utc>) -> String {
    time.format("%Y-%jT%H:%M:%S%.6f").to_string()
}

/// SCET in day-of-year form with milliseconds.
pub fn format_scet(time: &DateTime<Utc>) -> String {
    time.format("%Y-%jT%H:%M:%S%.3f").to_string()
}

/// Parses a command-line time.
///
/// Accepts day-of-year (`2024-123T04:05:06.789`) and calendar
/// (`2024-05-02T04:05:06.789`) forms; the fraction is optional and may carry
/// up to nine digits. All times are UTC.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>, FetchError> {
    let text = text.trim();
    let doy = Regex::new(r"^(\d{4})-(\d{3})T(\d{2}):(\d{2}):(\d{2})(?:\.(\d{1,9}))?Z?$")
        .map_err(|e| FetchError::InvalidTime(format!("Bad time pattern: {}", e)))?;

    if let Some(caps) = doy.captures(text) {
        let field = |idx: usize| -> Result<u32, FetchError> {
            caps[idx]
                .parse::<u32>()
                .map_err(|_| FetchError::InvalidTime(format!("Invalid time '{}'", text)))
        };
        let year = field(1)? as i32;
        let (doy, hour, minute, second) = (field(2)?, field(3)?, field(4)?, field(5)?);
        let nanos = match caps.get(6) {
            Some(frac) => fraction_to_nanos(frac.as_str()),
            None => 0,
        };
        let naive = NaiveDate::from_yo_opt(year, doy)
            .and_then(|date| date.and_hms_nano_opt(hour, minute, second, nanos))
            .ok_or_else(|| FetchError::InvalidTime(format!("Invalid time '{}'", text)))?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let calendar = text.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(calendar, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| {
            FetchError::InvalidTime(format!(
                "Invalid time '{}': expected YYYY-DOYTHH:MM:SS[.fff] or YYYY-MM-DDTHH:MM:SS[.fff]",
                text
            ))
        })
}

/// Parses an SCLK given as `coarse` or `coarse.fine` (also `coarse-fine`).
pub fn parse_sclk(text: &str) -> Result<Sclk, FetchError> {
    let text = text.trim();
    let pattern = Regex::new(r"^(\d{1,10})(?:[.\-](\d{1,5}))?$")
        .map_err(|e| FetchError::InvalidTime(format!("Bad SCLK pattern: {}", e)))?;
    let invalid = || FetchError::InvalidTime(format!("Invalid SCLK '{}'", text));

    let caps = pattern.captures(text).ok_or_else(invalid)?;
    let coarse = caps[1].parse::<u32>().map_err(|_| invalid())?;
    let fine = match caps.get(2) {
        Some(fine) => fine.as_str().parse::<u16>().map_err(|_| invalid())?,
        None => 0,
    };
    Ok(Sclk::new(coarse, fine))
}

fn fraction_to_nanos(digits: &str) -> u32 {
    let mut nanos = 0u32;
    for (idx, digit) in digits.bytes().take(9).enumerate() {
        nanos += u32::from(digit - b'0') * 10u32.pow(8 - idx as u32);
    }
    nanos
}

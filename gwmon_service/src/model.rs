/// Core data types for the groundwater monitoring refresh service.
///
/// This module defines the shared domain model imported by all other modules:
/// the raw reading shape returned by the India-WRIS groundwater dataset, the
/// two row shapes we persist (district daily summaries and the cross-district
/// live status table), and the crate error type.
///
/// The upstream payload is loosely typed (coordinates arrive as strings or
/// numbers, timestamps as structured objects or ISO strings), so the serde
/// helpers here normalize it once at the edge.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of day columns in a daily summary row (`day1_value` ..= `day10_value`).
pub const SUMMARY_DAYS: usize = 10;

// ---------------------------------------------------------------------------
// Station code
// ---------------------------------------------------------------------------

/// A validated station identifier.
///
/// India-WRIS station codes are opaque strings (e.g. "W03215"). The only
/// requirement we enforce is that the code is non-empty after trimming;
/// readings without one are discarded before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StationCode(String);

impl StationCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(StationCode(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Upstream reading types
// ---------------------------------------------------------------------------

/// Timestamp of an upstream reading.
///
/// The dataset serializes `dataTime` as a Java `LocalDateTime` object
/// (`{"year": 2025, "monthValue": 9, "dayOfMonth": 14, ...}`), but some
/// responses carry a plain ISO string instead. Both are wall-clock times in
/// the station's local zone.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DataTime {
    Structured {
        year: i32,
        #[serde(rename = "monthValue")]
        month: u32,
        #[serde(rename = "dayOfMonth")]
        day: u32,
        #[serde(default)]
        hour: u32,
        #[serde(default)]
        minute: u32,
        #[serde(default)]
        second: u32,
    },
    Text(String),
    /// Epoch numbers, partial objects and other shapes. Never resolves to a
    /// timestamp, so the reading contributes no day column.
    Unrecognized(serde_json::Value),
}

impl DataTime {
    /// Builds a date-only structured timestamp (midnight).
    pub fn from_date(date: NaiveDate) -> Self {
        use chrono::Datelike;
        DataTime::Structured {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    /// Converts to a naive local timestamp.
    ///
    /// Returns `None` for impossible calendar dates or unparseable strings.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        match self {
            DataTime::Structured { year, month, day, hour, minute, second } => {
                NaiveDate::from_ymd_opt(*year, *month, *day)?.and_hms_opt(*hour, *minute, *second)
            }
            DataTime::Text(text) => parse_timestamp_text(text),
            DataTime::Unrecognized(_) => None,
        }
    }
}

fn parse_timestamp_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    // Offset-bearing strings keep their own wall-clock time, matching the
    // structured form which carries no offset at all.
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A single groundwater-level record from the India-WRIS dataset.
///
/// Every field is optional because the upstream regularly omits them; the
/// aggregation stages decide which omissions disqualify a reading.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(default, deserialize_with = "lenient_string")]
    pub station_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub station_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    /// Depth to water level in metres below ground, reported negative.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub data_value: Option<f64>,
    #[serde(default)]
    pub data_time: Option<DataTime>,
}

impl RawReading {
    pub fn code(&self) -> Option<StationCode> {
        self.station_code.as_deref().and_then(StationCode::parse)
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.data_time.as_ref().and_then(DataTime::to_naive)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrText::Number(n)) => Some(n).filter(|n| n.is_finite()),
        Some(NumberOrText::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Some(NumberOrText::Other(_)) | None => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrText::Number(n)) => Some(n.to_string()),
        Some(NumberOrText::Text(s)) => Some(s),
        Some(NumberOrText::Other(_)) | None => None,
    })
}

// ---------------------------------------------------------------------------
// Persisted row types
// ---------------------------------------------------------------------------

/// One row of a `<district>_daily_summary` table.
///
/// `days[0]` is `day1_value` (today), `days[9]` is `day10_value` (nine days
/// ago). At most one row exists per station code per table.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummaryRow {
    pub station_code: StationCode,
    pub station_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub days: [Option<f64>; SUMMARY_DAYS],
    pub last_updated: DateTime<Utc>,
}

impl DailySummaryRow {
    /// Value of the 1-based `day{n}_value` column. Out-of-range `n` is `None`.
    pub fn day_value(&self, n: usize) -> Option<f64> {
        if (1..=SUMMARY_DAYS).contains(&n) {
            self.days[n - 1]
        } else {
            None
        }
    }
}

/// Groundwater health category, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HgiStatus {
    Red,
    Yellow,
    Green,
}

impl HgiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HgiStatus::Red => "Red",
            HgiStatus::Yellow => "Yellow",
            HgiStatus::Green => "Green",
        }
    }
}

impl fmt::Display for HgiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HgiStatus {
    type Err = GwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(HgiStatus::Red),
            "yellow" => Ok(HgiStatus::Yellow),
            "green" => Ok(HgiStatus::Green),
            other => Err(GwError::Parse(format!("unknown HGI status '{}'", other))),
        }
    }
}

/// One row of the shared `live_station_data` table: the single most recent
/// reading per station, overwritten on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStatusRow {
    pub id: StationCode,
    pub name: Option<String>,
    pub district: Option<String>,
    pub hgi_status: HgiStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub water_level: f64,
    pub last_reading_time: NaiveDateTime,
}

impl LiveStatusRow {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while fetching, reshaping, or persisting station data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GwError {
    /// Non-2xx HTTP response from an upstream API.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// The request never produced a response (DNS, TLS, timeout).
    #[error("Request failed: {0}")]
    Request(String),
    /// The response body had an unexpected shape.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The destination store rejected a read or write.
    #[error("Database error: {0}")]
    Database(String),
    /// A required input (coordinates, station code, level) was absent.
    #[error("Missing input: {0}")]
    MissingInput(String),
    /// Invalid configuration or missing secret.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The station has no row in the requested summary table.
    #[error("Station not found: {0}")]
    StationNotFound(String),
}

impl From<reqwest::Error> for GwError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => GwError::Http(status.as_u16()),
            None if err.is_decode() => GwError::Parse(err.to_string()),
            None => GwError::Request(err.to_string()),
        }
    }
}

impl From<postgres::Error> for GwError {
    fn from(err: postgres::Error) -> Self {
        GwError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for GwError {
    fn from(err: serde_json::Error) -> Self {
        GwError::Parse(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

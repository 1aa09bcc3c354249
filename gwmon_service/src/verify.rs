//! Data Source Verification Module
//!
//! Checks every configured district against the live groundwater API to
//! find out which ones are answering and returning readings. Run it before
//! adding a district to the config, or when a refresh starts reporting
//! `No data found`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::districts::District;
use crate::ingest::ReadingSource;
use crate::logging::{self, DataSource};
use crate::model::{GwError, RawReading};
use crate::refresh::{fetch_all, summary_window};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub results: Vec<DistrictVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictVerification {
    pub district: String,
    pub table: String,
    pub status: VerificationStatus,
    pub reading_count: usize,
    pub station_count: usize,
    /// Readings that carry a station code, value and parseable timestamp.
    pub usable_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    /// The API answered but returned no usable readings.
    PartialSuccess,
    Failed,
}

// ============================================================================
// Per-district check
// ============================================================================

fn evaluate(
    district: &District,
    result: Result<Vec<RawReading>, GwError>,
) -> DistrictVerification {
    let mut check = DistrictVerification {
        district: district.api_name.clone(),
        table: district.table_name.clone(),
        status: VerificationStatus::Failed,
        reading_count: 0,
        station_count: 0,
        usable_count: 0,
        error_message: None,
    };

    match result {
        Ok(readings) => {
            let mut stations: Vec<_> = readings.iter().filter_map(|r| r.code()).collect();
            stations.sort();
            stations.dedup();

            check.reading_count = readings.len();
            check.station_count = stations.len();
            check.usable_count = readings
                .iter()
                .filter(|r| r.code().is_some() && r.data_value.is_some() && r.timestamp().is_some())
                .count();
            check.status = if check.usable_count > 0 {
                VerificationStatus::Success
            } else {
                VerificationStatus::PartialSuccess
            };
        }
        Err(e) => {
            check.error_message = Some(e.to_string());
        }
    }

    check
}

/// Fetches one district's summary window and reports what came back.
pub fn verify_district<S>(source: &S, district: &District, today: NaiveDate) -> DistrictVerification
where
    S: ReadingSource + ?Sized,
{
    let (start, end) = summary_window(today);
    evaluate(district, source.fetch_district(district, start, end))
}

// ============================================================================
// Full Verification Runner
// ============================================================================

/// Verifies all districts concurrently.
pub fn run_verification<S>(
    source: &S,
    districts: &[District],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> VerificationReport
where
    S: ReadingSource + ?Sized,
{
    let (start, end) = summary_window(today);
    let results: Vec<DistrictVerification> = fetch_all(source, districts, start, end)
        .into_iter()
        .map(|fetch| evaluate(fetch.district, fetch.result))
        .collect();

    for r in &results {
        match r.status {
            VerificationStatus::Success => logging::info(
                DataSource::Wris,
                Some(&r.district),
                &format!("OK ({} readings, {} stations)", r.reading_count, r.station_count),
            ),
            VerificationStatus::PartialSuccess => {
                logging::warn(DataSource::Wris, Some(&r.district), "answered with no usable readings")
            }
            VerificationStatus::Failed => logging::error(
                DataSource::Wris,
                Some(&r.district),
                &format!("FAILED: {}", r.error_message.as_deref().unwrap_or("Unknown")),
            ),
        }
    }

    let failed = results
        .iter()
        .filter(|r| r.status == VerificationStatus::Failed)
        .count();

    VerificationReport {
        timestamp: now.to_rfc3339(),
        summary: VerificationSummary {
            total: results.len(),
            working: results.len() - failed,
            failed,
        },
        results,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::districts::default_districts;
    use crate::model::DataTime;

    struct Canned;

    impl ReadingSource for Canned {
        fn fetch_district(
            &self,
            district: &District,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<RawReading>, GwError> {
            match district.api_name.as_str() {
                "Ludhiana" => Ok(vec![
                    RawReading {
                        station_code: Some("W1".into()),
                        data_value: Some(-10.0),
                        data_time: Some(DataTime::Text("2025-09-14".into())),
                        ..Default::default()
                    },
                    RawReading {
                        station_code: Some("W1".into()),
                        ..Default::default()
                    },
                ]),
                "Sangrur" => Ok(vec![RawReading::default()]),
                _ => Err(GwError::Http(500)),
            }
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 14).unwrap()
    }

    #[test]
    fn test_verify_district_counts_readings_and_stations() {
        let check = verify_district(&Canned, &District::new("Ludhiana"), today());
        assert_eq!(check.status, VerificationStatus::Success);
        assert_eq!(check.reading_count, 2);
        assert_eq!(check.station_count, 1);
        assert_eq!(check.usable_count, 1);
    }

    #[test]
    fn test_unusable_payload_is_partial_success() {
        let check = verify_district(&Canned, &District::new("Sangrur"), today());
        assert_eq!(check.status, VerificationStatus::PartialSuccess);
        assert!(check.error_message.is_none());
    }

    #[test]
    fn test_run_verification_summary() {
        let now = Utc::now();
        let report = run_verification(&Canned, &default_districts(), today(), now);
        assert_eq!(report.summary, VerificationSummary { total: 3, working: 2, failed: 1 });
        assert_eq!(report.results[2].status, VerificationStatus::Failed);
        assert_eq!(report.results[2].error_message.as_deref(), Some("HTTP error: 500"));
        assert_eq!(report.timestamp, now.to_rfc3339());
    }
}

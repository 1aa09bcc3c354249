/// India-WRIS Groundwater Level API Client
///
/// Retrieves manual and telemetric groundwater level readings published by
/// the Central Ground Water Board through the India-WRIS dataset service.
///
/// Endpoint: POST https://indiawris.gov.in/Dataset/Ground%20Water%20Level
/// Parameters are sent as `application/x-www-form-urlencoded`:
///   stateName, districtName, agencyName, startdate, enddate (YYYY-MM-DD),
///   download, page, size
///
/// The response is either a bare JSON array of readings or an object with a
/// `data` array, depending on the `download` flag and the API revision.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::districts::District;
use crate::ingest::ReadingSource;
use crate::logging::{self, DataSource};
use crate::model::{GwError, RawReading};

// ============================================================================
// Request Construction
// ============================================================================

/// Builds the form body for one district and date window.
pub fn build_form(
    config: &UpstreamConfig,
    district: &District,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(&'static str, String)> {
    vec![
        ("stateName", config.state_name.clone()),
        ("districtName", district.api_name.clone()),
        ("agencyName", config.agency_name.clone()),
        ("startdate", start.format("%Y-%m-%d").to_string()),
        ("enddate", end.format("%Y-%m-%d").to_string()),
        ("download", "true".to_string()),
        ("page", "0".to_string()),
        ("size", config.page_size.to_string()),
    ]
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Parses either response shape into readings.
///
/// - `[ {...}, ... ]`          → the array
/// - `{"data": [ {...} ]}`     → the `data` array
/// - `{"data": null}` / `{}`   → empty
///
/// Records that are not objects are skipped. Records that fail to
/// deserialize are skipped with a warning. Anything else at the top level
/// is a parse error.
pub fn parse_response(body: &str) -> Result<Vec<RawReading>, GwError> {
    let json: Value = serde_json::from_str(body)?;

    let records = match json {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(GwError::Parse(format!(
                    "expected 'data' to be an array, got {}",
                    json_kind(&other)
                )));
            }
        },
        other => {
            return Err(GwError::Parse(format!(
                "expected array or object at top level, got {}",
                json_kind(&other)
            )));
        }
    };

    let mut readings = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        if !record.is_object() {
            skipped += 1;
            continue;
        }
        match serde_json::from_value::<RawReading>(record) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                skipped += 1;
                logging::warn(DataSource::Wris, None, &format!("skipping malformed record: {}", e));
            }
        }
    }
    if skipped > 0 {
        logging::debug(
            DataSource::Wris,
            None,
            &format!("kept {} records, skipped {}", readings.len(), skipped),
        );
    }
    Ok(readings)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Tags each reading with the district it was requested for. The request
/// district overrides whatever the payload carries.
pub fn tag_district(readings: &mut [RawReading], district: &District) {
    for reading in readings {
        reading.district = Some(district.api_name.clone());
    }
}

// ============================================================================
// API Client
// ============================================================================

/// Blocking client for the dataset endpoint.
pub struct WrisClient {
    http: reqwest::blocking::Client,
    config: UpstreamConfig,
}

impl WrisClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, GwError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(WrisClient { http, config })
    }
}

impl ReadingSource for WrisClient {
    fn fetch_district(
        &self,
        district: &District,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawReading>, GwError> {
        let form = build_form(&self.config, district, start, end);

        logging::debug(
            DataSource::Wris,
            Some(&district.api_name),
            &format!("POST {} ({} to {})", self.config.base_url, start, end),
        );

        let response = self
            .http
            .post(&self.config.base_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()?;

        if !response.status().is_success() {
            return Err(GwError::Http(response.status().as_u16()));
        }

        let body = response.text()?;
        let mut readings = parse_response(&body)?;
        tag_district(&mut readings, district);

        logging::debug(
            DataSource::Wris,
            Some(&district.api_name),
            &format!("received {} readings", readings.len()),
        );

        Ok(readings)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2025, 9, 5).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
        )
    }

    #[test]
    fn test_build_form_contains_all_parameters() {
        let (start, end) = window();
        let form = build_form(&UpstreamConfig::default(), &District::new("Sangrur"), start, end);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap_or_else(|| panic!("missing form key {}", key))
        };
        assert_eq!(get("stateName"), "Punjab");
        assert_eq!(get("districtName"), "Sangrur");
        assert_eq!(get("agencyName"), "CGWB");
        assert_eq!(get("startdate"), "2025-09-05");
        assert_eq!(get("enddate"), "2025-09-14");
        assert_eq!(get("page"), "0");
        assert_eq!(get("size"), "2000");
    }

    #[test]
    fn test_parse_bare_array() {
        let body = r#"[
            {"stationCode": "W1", "dataValue": -10.0, "dataTime": "2025-09-14"},
            {"stationCode": "W2", "dataValue": -20.0, "dataTime": "2025-09-13"}
        ]"#;
        let readings = parse_response(body).expect("bare array should parse");
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].station_code.as_deref(), Some("W2"));
    }

    #[test]
    fn test_parse_data_wrapper() {
        let body = r#"{"statusCode": 200, "data": [{"stationCode": "W1", "dataValue": -10.0}]}"#;
        let readings = parse_response(body).expect("wrapped array should parse");
        assert_eq!(readings.len(), 1);
    }

    #[test]
    fn test_parse_null_or_missing_data_is_empty() {
        assert!(parse_response(r#"{"data": null}"#).unwrap().is_empty());
        assert!(parse_response(r#"{"message": "no records"}"#).unwrap().is_empty());
        assert!(parse_response("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_unexpected_shapes() {
        assert!(matches!(parse_response("42"), Err(GwError::Parse(_))));
        assert!(matches!(parse_response(r#"{"data": "oops"}"#), Err(GwError::Parse(_))));
        assert!(matches!(parse_response("<html>"), Err(GwError::Parse(_))));
    }

    #[test]
    fn test_parse_skips_non_object_records() {
        let body = r#"[null, 3, {"stationCode": "W1"}]"#;
        assert_eq!(parse_response(body).unwrap().len(), 1);
    }

    #[test]
    fn test_one_bad_record_does_not_lose_the_district() {
        let body = r#"[
            {"stationCode": "W1", "dataValue": -10.0, "dataTime": "2025-09-14"},
            {"stationCode": "W2", "dataTime": 1757808000000},
            {"stationCode": "W3", "dataValue": true, "dataTime": {"year": 2025, "monthValue": 9}},
            {"stationCode": {"nested": 1}, "dataValue": -3.0}
        ]"#;
        let readings = parse_response(body).expect("good records should survive bad neighbours");
        assert_eq!(readings.len(), 4);
        assert_eq!(readings[0].data_value, Some(-10.0));
        assert!(readings[0].timestamp().is_some());
        assert_eq!(readings[1].code().unwrap().as_str(), "W2");
        assert!(readings[1].timestamp().is_none(), "epoch dataTime contributes no date");
        assert!(readings[2].data_value.is_none());
        assert!(readings[3].code().is_none(), "object station code is discarded later");
    }

    #[test]
    fn test_tag_district_uses_request_district() {
        let mut readings = vec![
            RawReading { district: Some("Patiala".into()), ..Default::default() },
            RawReading::default(),
        ];
        tag_district(&mut readings, &District::new("Sangrur"));
        assert_eq!(readings[0].district.as_deref(), Some("Sangrur"));
        assert_eq!(readings[1].district.as_deref(), Some("Sangrur"));
    }

    #[test]
    #[ignore] // Don't run in CI - depends on external API
    fn wris_api_returns_readings_for_ludhiana() {
        let client = WrisClient::new(UpstreamConfig::default()).unwrap();
        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Duration::days(9);
        let readings = client
            .fetch_district(&District::new("Ludhiana"), start, end)
            .expect("live API request failed");
        println!("received {} readings", readings.len());
    }
}

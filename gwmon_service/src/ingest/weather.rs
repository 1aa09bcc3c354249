/// OpenWeather 5-day forecast client
///
/// The forecast endpoint returns 40 entries at 3-hour spacing. The station
/// forecast only needs daily rainfall totals, so entries are grouped by
/// local calendar day and their `rain.3h` amounts summed.
///
/// API Documentation: https://openweathermap.org/forecast5

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::ingest::RainfallSource;
use crate::logging::{self, DataSource};
use crate::model::GwError;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
}

/// One 3-hourly forecast slot.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEntry {
    /// Slot start, unix seconds.
    pub dt: i64,
    #[serde(default)]
    pub rain: Option<RainVolume>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RainVolume {
    /// Rain volume over the 3-hour slot, mm.
    #[serde(rename = "3h", default)]
    pub three_hour_mm: Option<f64>,
}

impl ForecastEntry {
    pub fn rain_mm(&self) -> f64 {
        self.rain
            .as_ref()
            .and_then(|r| r.three_hour_mm)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

pub fn parse_forecast(body: &str) -> Result<Vec<ForecastEntry>, GwError> {
    let response: ForecastResponse = serde_json::from_str(body)?;
    Ok(response.list)
}

// ============================================================================
// Daily Aggregation
// ============================================================================

/// Sums rainfall per local calendar day.
///
/// Days appear in the order first seen, which is chronological for the
/// API's sorted list. Only the first `days` are kept; missing days are
/// padded with zero so the result always has exactly `days` entries.
pub fn daily_rainfall(entries: &[ForecastEntry], offset: FixedOffset, days: usize) -> Vec<f64> {
    let mut totals: Vec<(NaiveDate, f64)> = Vec::new();

    for entry in entries {
        let Some(utc) = DateTime::from_timestamp(entry.dt, 0) else {
            continue;
        };
        let date = utc.with_timezone(&offset).date_naive();
        match totals.iter_mut().find(|(d, _)| *d == date) {
            Some((_, total)) => *total += entry.rain_mm(),
            None => totals.push((date, entry.rain_mm())),
        }
    }

    let mut result: Vec<f64> = totals.into_iter().take(days).map(|(_, t)| t).collect();
    result.resize(days, 0.0);
    result
}

// ============================================================================
// API Client
// ============================================================================

pub struct WeatherClient {
    http: reqwest::blocking::Client,
    config: WeatherConfig,
    api_key: Option<String>,
    offset: FixedOffset,
}

impl WeatherClient {
    pub fn new(
        config: WeatherConfig,
        api_key: Option<String>,
        offset: FixedOffset,
    ) -> Result<Self, GwError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(WeatherClient { http, config, api_key, offset })
    }
}

impl RainfallSource for WeatherClient {
    fn daily_rainfall(
        &self,
        latitude: f64,
        longitude: f64,
        days: usize,
    ) -> Result<Vec<f64>, GwError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GwError::Config("OPENWEATHER_API_KEY is not set".into()))?;

        let response = self
            .http
            .get(&self.config.base_url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            logging::warn(
                DataSource::Weather,
                None,
                &format!("forecast request for ({}, {}) returned {}", latitude, longitude, status),
            );
            return Err(GwError::Http(status));
        }

        let entries = parse_forecast(&response.text()?)?;
        Ok(daily_rainfall(&entries, self.offset, days))
    }
}

// ============================================================================
// Tests
// ============================================================================

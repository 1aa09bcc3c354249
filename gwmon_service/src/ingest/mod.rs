/// Upstream API clients.
///
/// Submodules:
/// - `wris`    — India-WRIS groundwater level dataset (station readings).
/// - `weather` — OpenWeather 5-day forecast, reduced to daily rainfall.
/// - `llm`     — Gemini prompt/response handling for crop recommendations.
///
/// The refresh jobs and the forecast only see the traits below, so tests
/// can drive them with canned payloads instead of live HTTP.

pub mod llm;
pub mod weather;
pub mod wris;

use chrono::NaiveDate;

use crate::districts::District;
use crate::model::{GwError, RawReading};

/// Anything that can return a district's readings for a date window.
///
/// `Sync` because the refresh jobs fan out one thread per district over a
/// shared source.
pub trait ReadingSource: Sync {
    fn fetch_district(
        &self,
        district: &District,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawReading>, GwError>;
}

/// Anything that can forecast daily rainfall totals (mm) for a location.
pub trait RainfallSource {
    /// Returns exactly `days` totals, first entry = first forecast day.
    fn daily_rainfall(&self, latitude: f64, longitude: f64, days: usize)
        -> Result<Vec<f64>, GwError>;
}

/// Naive five-day groundwater level forecast.
///
/// Starting from a station's most recent summary value, each forecast day
/// adds that day's rainfall scaled by a fixed recharge rate:
///
///   L(i) = L(i-1) + rain(i) * RECHARGE_RATE * RESPONSE_FACTOR
///
/// The output is monotonically non-decreasing because rainfall is never
/// negative. There is no decay, pumping or seasonal term.

use serde::Serialize;

use crate::db::StationStore;
use crate::districts::{District, find_district};
use crate::ingest::RainfallSource;
use crate::logging::{self, DataSource};
use crate::model::{DailySummaryRow, GwError, StationCode};

/// Metres of level rise per millimetre of rainfall.
pub const RECHARGE_RATE: f64 = 0.15;

pub const RESPONSE_FACTOR: f64 = 1.0;

pub const FORECAST_DAYS: usize = 5;

/// Response body of the forecast command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationForecast {
    /// Summary values oldest first (day10 .. day1), nulls dropped.
    pub historical_data: Vec<f64>,
    pub forecast_data: Vec<f64>,
}

/// Cumulative projection of `start` over `rainfall` (mm per day).
pub fn project_levels(start: f64, rainfall: &[f64]) -> Vec<f64> {
    let mut level = start;
    rainfall
        .iter()
        .map(|mm| {
            level += mm * RECHARGE_RATE * RESPONSE_FACTOR;
            level
        })
        .collect()
}

pub fn historical_series(row: &DailySummaryRow) -> Vec<f64> {
    row.days.iter().rev().flatten().copied().collect()
}

/// Most recent non-null day value (day1 first).
pub fn current_level(row: &DailySummaryRow) -> Option<f64> {
    row.days.iter().flatten().copied().next()
}

/// Loads the station's summary row, fetches rainfall for its location and
/// projects the level forward `FORECAST_DAYS` days.
pub fn station_forecast<S, R>(
    store: &mut S,
    rain: &R,
    districts: &[District],
    station_code: &str,
    district_name: &str,
) -> Result<StationForecast, GwError>
where
    S: StationStore + ?Sized,
    R: RainfallSource + ?Sized,
{
    let code = StationCode::parse(station_code)
        .ok_or_else(|| GwError::MissingInput("stationCode is required".into()))?;
    if district_name.trim().is_empty() {
        return Err(GwError::MissingInput("districtName is required".into()));
    }
    let district = find_district(districts, district_name)
        .ok_or_else(|| GwError::Config(format!("unknown district '{}'", district_name.trim())))?;

    let row = store
        .fetch_daily(&district.table_name, &code)?
        .ok_or_else(|| GwError::StationNotFound(code.to_string()))?;

    let (Some(latitude), Some(longitude)) = (row.latitude, row.longitude) else {
        return Err(GwError::MissingInput(format!("station {} has no coordinates", code)));
    };
    let start = current_level(&row).ok_or_else(|| {
        GwError::MissingInput(format!("station {} has no recent level", code))
    })?;

    let rainfall = rain.daily_rainfall(latitude, longitude, FORECAST_DAYS)?;
    logging::debug(
        DataSource::Weather,
        Some(code.as_str()),
        &format!("rainfall forecast {:?} mm", rainfall),
    );

    Ok(StationForecast {
        historical_data: historical_series(&row),
        forecast_data: project_levels(start, &rainfall),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

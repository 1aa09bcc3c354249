//! District station listing.
//!
//! Reads a district's summary table and flattens each row into what a
//! station picker needs: identity, location, the latest level and the
//! ten-day history. Rows whose refresh stamp is older than the configured
//! threshold are flagged stale rather than dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::stalenesses::summary_is_stale_at;
use crate::alert::thresholds::classify;
use crate::analysis::forecast::{current_level, historical_series};
use crate::db::StationStore;
use crate::districts::{District, find_district};
use crate::logging::{self, DataSource};
use crate::model::{DailySummaryRow, GwError, HgiStatus, StationCode};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSummary {
    pub station_code: StationCode,
    pub station_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub current_level: Option<f64>,
    /// `None` when the station has no recent level to classify.
    pub hgi_status: Option<HgiStatus>,
    /// Oldest first, nulls dropped.
    pub history: Vec<f64>,
    pub last_updated: DateTime<Utc>,
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictListing {
    pub district: String,
    pub station_count: usize,
    pub stale_count: usize,
    pub stations: Vec<StationSummary>,
}

pub fn summarize_row(row: &DailySummaryRow, stale_after_minutes: u64, now: DateTime<Utc>) -> StationSummary {
    let current = current_level(row);
    StationSummary {
        station_code: row.station_code.clone(),
        station_name: row.station_name.clone(),
        latitude: row.latitude,
        longitude: row.longitude,
        current_level: current,
        hgi_status: current.map(classify),
        history: historical_series(row),
        last_updated: row.last_updated,
        stale: summary_is_stale_at(row, stale_after_minutes, now),
    }
}

/// Lists every station stored for `district_name`, ordered by code.
pub fn list_district_stations<S>(
    store: &mut S,
    districts: &[District],
    district_name: &str,
    stale_after_minutes: u64,
    now: DateTime<Utc>,
) -> Result<DistrictListing, GwError>
where
    S: StationStore + ?Sized,
{
    if district_name.trim().is_empty() {
        return Err(GwError::MissingInput("districtName is required".into()));
    }
    let district = find_district(districts, district_name)
        .ok_or_else(|| GwError::Config(format!("unknown district '{}'", district_name.trim())))?;

    let stations: Vec<StationSummary> = store
        .list_daily(&district.table_name)?
        .iter()
        .map(|row| summarize_row(row, stale_after_minutes, now))
        .collect();
    let stale_count = stations.iter().filter(|s| s.stale).count();
    if stale_count > 0 {
        logging::warn(
            DataSource::Database,
            Some(&district.table_name),
            &format!("{} of {} stations stale", stale_count, stations.len()),
        );
    }

    Ok(DistrictListing {
        district: district.api_name.clone(),
        station_count: stations.len(),
        stale_count,
        stations,
    })
}

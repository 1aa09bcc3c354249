/// Dashboard headline numbers computed from the live status table.
///
/// The dashboard header shows an average level, a count of critical
/// stations and the districts that are doing well. All of that is derived
/// here from one pass over the live rows so the clients never have to.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::alert::stalenesses::live_is_stale_at;
use crate::model::{HgiStatus, LiveStatusRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub station_count: usize,
    /// Mean water level over all stations, `None` when there are none.
    pub average_level: Option<f64>,
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
    /// Stations whose last reading is older than the staleness threshold.
    pub stale: usize,
    /// Districts with at least one Red station, sorted.
    pub critical_districts: Vec<String>,
    /// Districts whose every station is Green, sorted.
    pub stable_districts: Vec<String>,
}

pub fn summarize(
    rows: &[LiveStatusRow],
    offset: FixedOffset,
    now: DateTime<Utc>,
    stale_after_minutes: u64,
) -> KpiSummary {
    let mut red = 0;
    let mut yellow = 0;
    let mut green = 0;
    let mut stale = 0;
    let mut total = 0.0;
    // Worst status seen per district.
    let mut worst: BTreeMap<&str, HgiStatus> = BTreeMap::new();

    for row in rows {
        match row.hgi_status {
            HgiStatus::Red => red += 1,
            HgiStatus::Yellow => yellow += 1,
            HgiStatus::Green => green += 1,
        }
        total += row.water_level;
        if live_is_stale_at(row, offset, stale_after_minutes, now) {
            stale += 1;
        }
        if let Some(district) = row.district.as_deref() {
            worst
                .entry(district)
                .and_modify(|s| *s = (*s).min(row.hgi_status))
                .or_insert(row.hgi_status);
        }
    }

    let districts_with = |status: HgiStatus| -> Vec<String> {
        worst
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(d, _)| d.to_string())
            .collect()
    };

    KpiSummary {
        station_count: rows.len(),
        average_level: (!rows.is_empty()).then(|| total / rows.len() as f64),
        red,
        yellow,
        green,
        stale,
        critical_districts: districts_with(HgiStatus::Red),
        stable_districts: districts_with(HgiStatus::Green),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

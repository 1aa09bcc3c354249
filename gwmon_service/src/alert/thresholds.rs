//! HGI status classification and daily station alerts.
//!
//! Groundwater depth is reported as a negative number of metres below
//! ground level, so "lower" means deeper and worse. Thresholds are fixed for
//! every district.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{HgiStatus, LiveStatusRow};

/// At or below this depth a station is Red.
pub const HGI_CRITICAL: f64 = -50.0;

/// At or below this depth (and above critical) a station is Yellow.
pub const HGI_WARNING: f64 = -30.0;

/// Classifies a water level. A value exactly on a threshold falls into the
/// stricter category. No hysteresis: this is a pure function of `value`.
pub fn classify(value: f64) -> HgiStatus {
    if value <= HGI_CRITICAL {
        HgiStatus::Red
    } else if value <= HGI_WARNING {
        HgiStatus::Yellow
    } else {
        HgiStatus::Green
    }
}

/// Alert severity levels, in descending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AlertSeverity {
    Critical,
    Warning,
}

/// An alert raised for a station whose latest reading today is Red or Yellow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationAlert {
    pub id: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub reading_time: chrono::NaiveDateTime,
}

/// Returns an alert for `row` if its status warrants one.
pub fn alert_for(row: &LiveStatusRow) -> Option<StationAlert> {
    let severity = match row.hgi_status {
        HgiStatus::Red => AlertSeverity::Critical,
        HgiStatus::Yellow => AlertSeverity::Warning,
        HgiStatus::Green => return None,
    };
    let name = row.name.as_deref().unwrap_or(row.id.as_str());
    Some(StationAlert {
        id: row.id.to_string(),
        severity,
        title: format!("Station {} Alert", name),
        message: format!(
            "HGI is {} at level {}.",
            row.hgi_status.as_str().to_uppercase(),
            row.water_level
        ),
        reading_time: row.last_reading_time,
    })
}

/// Alerts for every Red/Yellow station whose reading was taken on `today`.
///
/// At most one alert per station (the live table already holds one row per
/// station, but callers may pass merged lists). Ordered most severe first,
/// then by title.
pub fn daily_alerts(rows: &[LiveStatusRow], today: NaiveDate) -> Vec<StationAlert> {
    let mut alerts: Vec<StationAlert> = Vec::new();
    for row in rows.iter().filter(|r| r.last_reading_time.date() == today) {
        let Some(alert) = alert_for(row) else { continue };
        match alerts.iter_mut().find(|a| a.id == alert.id) {
            Some(existing) if alert.reading_time >= existing.reading_time => *existing = alert,
            Some(_) => {}
            None => alerts.push(alert),
        }
    }
    alerts.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.title.cmp(&b.title)));
    alerts
}

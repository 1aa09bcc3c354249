//! Nearest-station lookup and free-text station search over live rows.

use serde::Serialize;

use crate::model::LiveStatusRow;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two (lat, lon) points in
/// decimal degrees.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyStation {
    #[serde(flatten)]
    pub station: LiveStatusRow,
    pub distance_km: f64,
}

/// The `limit` stations closest to `origin`, nearest first. Stations
/// without coordinates are skipped. Equal distances keep input order.
pub fn nearest_stations(
    rows: &[LiveStatusRow],
    origin: (f64, f64),
    limit: usize,
) -> Vec<NearbyStation> {
    let mut nearby: Vec<NearbyStation> = rows
        .iter()
        .filter_map(|row| {
            let point = row.coordinates()?;
            Some(NearbyStation {
                station: row.clone(),
                distance_km: haversine_km(origin, point),
            })
        })
        .collect();
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby.truncate(limit);
    nearby
}

/// Case-insensitive substring match on station name, id and district.
/// A blank query matches everything.
pub fn search_stations<'a>(rows: &'a [LiveStatusRow], query: &str) -> Vec<&'a LiveStatusRow> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.iter().collect();
    }
    let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&needle));
    rows.iter()
        .filter(|r| {
            hit(r.name.as_deref()) || hit(Some(r.id.as_str())) || hit(r.district.as_deref())
        })
        .collect()
}

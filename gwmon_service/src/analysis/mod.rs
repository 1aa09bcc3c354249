/// Data reshaping and derived values for the groundwater service.
///
/// This module turns flat upstream reading lists into the row shapes we
/// persist, and computes the read-side values the dashboards display.
///
/// Submodules:
/// - `daily`    — 10-day bucketing of readings into district summary rows.
/// - `latest`   — latest-reading-per-station reduction for the live table.
/// - `forecast` — naive rainfall-driven level projection.
/// - `geo`      — haversine distance, nearest stations, station search.
/// - `kpi`      — dashboard headline numbers.
/// - `listing`  — per-district station listing from the summary tables.

pub mod daily;
pub mod forecast;
pub mod geo;
pub mod kpi;
pub mod latest;
pub mod listing;

/// Station status alerting.
///
/// Submodules:
/// - `thresholds`   — HGI classification and the daily Red/Yellow alert list.
/// - `stalenesses`  — wall-clock freshness checks for stored rows.

pub mod stalenesses;
pub mod thresholds;

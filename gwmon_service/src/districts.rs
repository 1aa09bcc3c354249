/// District registry for the groundwater refresh jobs.
///
/// Defines the canonical list of Punjab districts polled from the India-WRIS
/// groundwater dataset, and the per-district summary table each one lands
/// in. This is the default source of truth for table names; a deployment
/// may override the list in `gwmon.toml`, but every configured table still
/// has to pass `is_safe_table_name` because it is interpolated into SQL.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// District metadata
// ---------------------------------------------------------------------------

/// A district polled by the refresh jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    /// District name exactly as the upstream API expects it.
    pub api_name: String,
    /// Destination `<district>_daily_summary` table. Left empty in config
    /// files to take the conventional name.
    #[serde(default)]
    pub table_name: String,
}

impl District {
    pub fn new(api_name: &str) -> Self {
        District {
            api_name: api_name.to_string(),
            table_name: table_for(api_name),
        }
    }
}

/// Districts monitored by default, in refresh order.
pub static DISTRICT_REGISTRY: &[(&str, &str)] = &[
    ("Ludhiana", "ludhiana_daily_summary"),
    ("Sangrur", "sangrur_daily_summary"),
    ("Amritsar", "amritsar_daily_summary"),
];

/// The default district list as owned values.
pub fn default_districts() -> Vec<District> {
    DISTRICT_REGISTRY
        .iter()
        .map(|(api_name, table_name)| District {
            api_name: api_name.to_string(),
            table_name: table_name.to_string(),
        })
        .collect()
}

/// Looks up a district by name, ignoring case. Returns `None` if not found.
pub fn find_district<'a>(districts: &'a [District], name: &str) -> Option<&'a District> {
    let name = name.trim();
    districts
        .iter()
        .find(|d| d.api_name.eq_ignore_ascii_case(name))
}

/// Conventional summary table name for a district: `{lowercase}_daily_summary`.
pub fn table_for(district_name: &str) -> String {
    let slug: String = district_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{}_daily_summary", slug)
}

/// True if `name` can be interpolated into SQL as an unquoted identifier:
/// lowercase ASCII letters, digits and underscores, not starting with a digit.
pub fn is_safe_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

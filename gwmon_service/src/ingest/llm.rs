/// Crop recommendations via the Gemini `generateContent` API.
///
/// The model is asked for a fixed JSON shape; it tends to wrap the JSON in
/// markdown fences regardless, so the text is stripped before a direct
/// parse. There is no schema validation beyond the typed deserialize.

use std::time::Duration;

use chrono::Month;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::LlmConfig;
use crate::logging::{self, DataSource};
use crate::model::GwError;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRecommendation {
    pub recommended: Vec<Crop>,
    pub avoid: Crop,
}

// ============================================================================
// Prompt Construction
// ============================================================================

/// Full language name for a two-letter locale; unknown locales get English.
pub fn language_name(locale: &str) -> &'static str {
    match locale.trim().to_ascii_lowercase().as_str() {
        "hi" => "Hindi",
        "pa" => "Punjabi",
        "ta" => "Tamil",
        "te" => "Telugu",
        _ => "English",
    }
}

/// The sowing season that follows `month` (1-12). Rabi is sown Oct-Dec,
/// Kharif Jun-Jul.
pub fn upcoming_season(month: u32) -> &'static str {
    if (8..=12).contains(&month) {
        "Rabi"
    } else {
        "Kharif"
    }
}

pub fn build_prompt(latitude: f64, longitude: f64, locale: &str, month: u32) -> String {
    let month_name = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("unknown");
    let season = upcoming_season(month);
    let language = language_name(locale);

    format!(
        r#"You are an agricultural expert for India, specifically for the region around Haryana and Punjab. A farmer at latitude {latitude}, longitude {longitude} needs a crop recommendation.
Key information:
- The current month is {month_name}.
Based on this location and season, recommend 3 suitable crops for the upcoming {season} season.
For each crop, provide a short, simple reason.
Also, recommend one popular crop to AVOID in this region and explain why.
IMPORTANT: Provide the entire JSON response translated into the {language} language.
Provide the response ONLY in this exact JSON format, with no extra text or markdown formatting:
{{
  "recommended": [
    {{ "name": "Crop Name", "reason": "Reason" }},
    {{ "name": "Crop Name", "reason": "Reason" }},
    {{ "name": "Crop Name", "reason": "Reason" }}
  ],
  "avoid": {{ "name": "Crop Name", "reason": "Reason" }}
}}"#
    )
}

// ============================================================================
// Response Handling
// ============================================================================

/// Removes markdown code fences (```json / ```) and surrounding whitespace.
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Pulls `candidates[0].content.parts[0].text` out of a Gemini response.
pub fn extract_text(body: &str) -> Result<String, GwError> {
    let json: Value = serde_json::from_str(body)?;
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GwError::Parse("response has no candidate text".into()))
}

pub fn parse_recommendation(text: &str) -> Result<CropRecommendation, GwError> {
    Ok(serde_json::from_str(&strip_fences(text))?)
}

// ============================================================================
// API Client
// ============================================================================

pub struct LlmClient {
    http: reqwest::blocking::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(config: LlmConfig, api_key: Option<String>) -> Result<Self, GwError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(LlmClient { http, config, api_key })
    }

    pub fn recommend(
        &self,
        latitude: f64,
        longitude: f64,
        locale: &str,
        month: u32,
    ) -> Result<CropRecommendation, GwError> {
        if !valid_coordinates(latitude, longitude) {
            return Err(GwError::MissingInput("valid latitude and longitude are required".into()));
        }
        if locale.trim().is_empty() {
            return Err(GwError::MissingInput("locale is required".into()));
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GwError::Config("GEMINI_API_KEY is not set".into()))?;

        let url = format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let prompt = build_prompt(latitude, longitude, locale, month);
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            logging::error(
                DataSource::Llm,
                None,
                &format!("generateContent failed with status {}: {}", status.as_u16(), text),
            );
            return Err(GwError::Http(status.as_u16()));
        }

        parse_recommendation(&extract_text(&text)?)
    }
}

fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

// ============================================================================
// Tests
// ============================================================================

//! Translation service client
//!
//! Thin REST client for the Google Translate v2 endpoints. Constructed only
//! when translation is enabled; the normalizer holds it as an optional
//! capability and degrades to detection-only when it is absent.

use serde::Deserialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

const TRANSLATE_BASE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// Detection result from the translation service
#[derive(Debug, Clone)]
pub struct Detection {
    pub language: String,
    pub confidence: f64,
}

pub struct Translator {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Debug, Deserialize)]
struct DetectData {
    detections: Vec<Vec<DetectionEntry>>,
}

#[derive(Debug, Deserialize)]
struct DetectionEntry {
    language: String,
    #[serde(default)]
    confidence: f64,
}

impl Translator {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: TRANSLATE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Detects the language of the text with a confidence score
    pub async fn detect(&self, text: &str) -> Result<Detection> {
        let url = format!("{}/detect", self.base_url);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "q": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::TranslationError(format!(
                "detect failed ({}): {}",
                status, body
            )));
        }

        let parsed: DetectResponse = response.json().await?;
        let entry = parsed
            .data
            .detections
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| PipelineError::TranslationError("empty detection".to_string()))?;

        debug!(language = %entry.language, confidence = entry.confidence, "Detected language");

        Ok(Detection {
            language: entry.language,
            confidence: entry.confidence,
        })
    }

    /// Translates text to the target language
    pub async fn translate(&self, text: &str, target: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "q": text, "target": target }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::TranslationError(format!(
                "translate failed ({}): {}",
                status, body
            )));
        }

        let parsed: TranslateResponse = response.json().await?;
        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| PipelineError::TranslationError("empty translation".to_string()))
    }
}

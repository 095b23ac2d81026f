//! LLM provider client
//!
//! REST client for the Gemini generateContent and embedContent endpoints.
//! The enricher holds this as a capability handle and falls back to
//! deterministic defaults per field when a call fails.

use serde::Deserialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for text generation tasks
pub const GENERATION_MODEL: &str = "gemini-1.5-flash";
/// Model used for embeddings
pub const EMBEDDING_MODEL: &str = "models/embedding-001";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Runs a single-prompt generation and returns the model text
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, GENERATION_MODEL);

        debug!(model = GENERATION_MODEL, "LLM generate request");

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.1 }
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::ModelError(format!(
                "generate failed ({}): {}",
                status, text
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| PipelineError::ModelError("empty model response".to_string()))
    }

    /// Generates a dense embedding vector for the text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/{}:embedContent", self.base_url, EMBEDDING_MODEL);

        debug!(model = EMBEDDING_MODEL, "LLM embed request");

        let body = serde_json::json!({
            "model": EMBEDDING_MODEL,
            "content": { "parts": [{ "text": text }] }
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::ModelError(format!(
                "embed failed ({}): {}",
                status, text
            )));
        }

        let parsed: EmbedResponse = response.json().await?;
        Ok(parsed.embedding.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_response_parsing() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "A concise summary of the article."}],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        }"#;

        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.candidates[0].content.parts[0].text,
            "A concise summary of the article."
        );
    }

    #[test]
    fn test_embed_response_parsing() {
        let json = r#"{"embedding": {"values": [0.1, -0.2, 0.3]}}"#;
        let parsed: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embedding.values.len(), 3);
    }
}

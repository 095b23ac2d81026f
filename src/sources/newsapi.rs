//! Headline API source
//!
//! Fetches one top-headlines page (up to 100 items) when an API key is
//! configured. Articles take `source` from the provider's source name
//! rather than a feed host.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::Source;
use crate::error::{PipelineError, Result};
use crate::http::ResilientHttpClient;
use crate::schemas::{Metadata, RawArticle};

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    status: String,
    #[serde(default)]
    articles: Vec<ApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiArticle {
    pub source: ApiArticleSource,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    #[serde(rename = "urlToImage")]
    pub url_to_image: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiArticleSource {
    pub id: Option<String>,
    pub name: String,
}

pub struct HeadlineApiSource {
    client: Arc<ResilientHttpClient>,
    api_key: String,
    base_url: String,
}

impl HeadlineApiSource {
    pub fn new(client: Arc<ResilientHttpClient>, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: NEWSAPI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn article_to_raw(item: ApiArticle) -> RawArticle {
        let published_at = item
            .published_at
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        // Prefer the (truncated) content field, then the description
        let content = item
            .content
            .or(item.description)
            .unwrap_or_default();

        let mut metadata = Metadata::new();
        metadata.insert("api_source".to_string(), serde_json::json!("newsapi"));
        if let Some(id) = item.source.id {
            metadata.insert("source_id".to_string(), serde_json::json!(id));
        }
        if let Some(image) = item.url_to_image {
            metadata.insert("url_to_image".to_string(), serde_json::json!(image));
        }

        RawArticle::new(
            item.url,
            item.title,
            content,
            item.author,
            item.source.name,
            published_at,
            metadata,
        )
    }
}

#[async_trait]
impl Source for HeadlineApiSource {
    fn name(&self) -> &str {
        "newsapi"
    }

    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        let url = format!("{}/top-headlines", self.base_url);
        let params = [
            ("apiKey", self.api_key.as_str()),
            ("language", "en"),
            ("pageSize", "100"),
            ("country", "us"),
        ];

        debug!(source = "newsapi", "Fetching headlines");

        let response = self.client.get_with_query(&url, &params).await?;
        let parsed: HeadlinesResponse = response.json().await?;

        if parsed.status != "ok" {
            return Err(PipelineError::ApiError {
                code: parsed.code.unwrap_or_else(|| "unknown".to_string()),
                message: parsed.message.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        let articles: Vec<RawArticle> = parsed
            .articles
            .into_iter()
            .map(Self::article_to_raw)
            .collect();

        info!(source = "newsapi", articles = articles.len(), "Fetched headlines");

        Ok(articles)
    }
}

//! Article records for each pipeline stage
//!
//! Records form a single logical chain keyed by `id`, which is assigned at
//! ingestion and preserved through every stage. Each later stage copies all
//! earlier fields forward; no record is mutated after publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Metadata, Sentiment};

/// Raw article from RSS/API feeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    /// Unique article identifier, assigned at ingestion
    pub id: String,
    /// Original article URL
    pub url: String,
    /// Article title
    pub title: String,
    /// Raw, markup-bearing content
    pub content: String,
    pub author: Option<String>,
    /// Source name or domain
    pub source: String,
    /// Publication timestamp
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl RawArticle {
    /// Creates a raw article with a fresh id and the current scrape time
    pub fn new(
        url: String,
        title: String,
        content: String,
        author: Option<String>,
        source: String,
        published_at: DateTime<Utc>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            title,
            content,
            author,
            source,
            published_at,
            scraped_at: Utc::now(),
            metadata,
        }
    }
}

/// Article after HTML cleaning and deduplication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedArticle {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Clean text content, whitespace-normalized
    pub text: String,
    pub author: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    /// Content hash for deduplication, stable across re-ingestion
    pub content_hash: String,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CleanedArticle {
    /// Builds the cleaned record from its raw predecessor
    pub fn from_raw(raw: RawArticle, text: String, content_hash: String, is_duplicate: bool) -> Self {
        Self {
            id: raw.id,
            url: raw.url,
            title: raw.title.trim().to_string(),
            text,
            author: raw.author,
            source: raw.source,
            published_at: raw.published_at,
            scraped_at: raw.scraped_at,
            content_hash,
            is_duplicate,
            metadata: raw.metadata,
        }
    }
}

/// Article after language detection and normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedArticle {
    pub id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub author: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub content_hash: String,
    /// Detected language code (two-letter)
    pub language: String,
    pub translated_title: Option<String>,
    pub translated_text: Option<String>,
    /// Whitespace-token count of the original text
    pub word_count: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NormalizedArticle {
    pub fn from_cleaned(
        cleaned: CleanedArticle,
        language: String,
        translated_title: Option<String>,
        translated_text: Option<String>,
        word_count: usize,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: cleaned.id,
            url: cleaned.url,
            title: cleaned.title,
            text: cleaned.text,
            author: cleaned.author,
            source: cleaned.source,
            published_at: cleaned.published_at,
            scraped_at: cleaned.scraped_at,
            content_hash: cleaned.content_hash,
            language,
            translated_title,
            translated_text,
            word_count,
            metadata,
        }
    }
}

/// Model-produced enrichment fields
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub summary: String,
    pub topics: Vec<String>,
    pub entities: Vec<String>,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub embeddings: Vec<f32>,
}

/// Article after LLM enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub author: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub content_hash: String,
    pub language: String,
    pub translated_title: Option<String>,
    pub translated_text: Option<String>,
    pub word_count: usize,

    /// 1-2 sentence summary
    pub summary: String,
    /// Extracted topics, at most 5
    #[serde(default)]
    pub topics: Vec<String>,
    /// Named entities, at most 10
    #[serde(default)]
    pub entities: Vec<String>,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    /// Dense vector, empty or of the configured dimension
    #[serde(default)]
    pub embeddings: Vec<f32>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl EnrichedArticle {
    pub fn from_normalized(
        normalized: NormalizedArticle,
        enrichment: Enrichment,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: normalized.id,
            url: normalized.url,
            title: normalized.title,
            text: normalized.text,
            author: normalized.author,
            source: normalized.source,
            published_at: normalized.published_at,
            scraped_at: normalized.scraped_at,
            content_hash: normalized.content_hash,
            language: normalized.language,
            translated_title: normalized.translated_title,
            translated_text: normalized.translated_text,
            word_count: normalized.word_count,
            summary: enrichment.summary,
            topics: enrichment.topics,
            entities: enrichment.entities,
            sentiment: enrichment.sentiment,
            sentiment_score: enrichment.sentiment_score,
            embeddings: enrichment.embeddings,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_raw() -> RawArticle {
        RawArticle::new(
            "https://example.com/article".to_string(),
            "Quantum Leap".to_string(),
            "<p>Scientists discovered something remarkable.</p>".to_string(),
            Some("Jane Doe".to_string()),
            "example.com".to_string(),
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
            Metadata::new(),
        )
    }

    #[test]
    fn test_id_preserved_through_stages() {
        let raw = sample_raw();
        let id = raw.id.clone();

        let cleaned = CleanedArticle::from_raw(
            raw,
            "Scientists discovered something remarkable.".to_string(),
            "abc123".to_string(),
            false,
        );
        assert_eq!(cleaned.id, id);

        let normalized = NormalizedArticle::from_cleaned(
            cleaned,
            "en".to_string(),
            None,
            None,
            5,
            Metadata::new(),
        );
        assert_eq!(normalized.id, id);

        let enriched = EnrichedArticle::from_normalized(
            normalized,
            Enrichment {
                summary: "A discovery.".to_string(),
                topics: vec!["science".to_string()],
                entities: vec![],
                sentiment: Sentiment::Neutral,
                sentiment_score: 0.0,
                embeddings: vec![],
            },
            Metadata::new(),
        );
        assert_eq!(enriched.id, id);
        assert_eq!(enriched.content_hash, "abc123");
    }

    #[test]
    fn test_raw_article_serialization_round_trip() {
        let raw = sample_raw();
        let json = serde_json::to_string(&raw).unwrap();

        assert!(json.contains("\"published_at\":\"2025-01-15T10:00:00Z\""));
        assert!(json.contains("\"content\""));

        let parsed: RawArticle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, raw.id);
        assert_eq!(parsed.published_at, raw.published_at);
    }

    #[test]
    fn test_cleaned_article_has_text_not_content() {
        let raw = sample_raw();
        let cleaned = CleanedArticle::from_raw(raw, "plain text".to_string(), "h".to_string(), false);
        let json = serde_json::to_string(&cleaned).unwrap();

        assert!(json.contains("\"text\":\"plain text\""));
        assert!(!json.contains("\"content\""));
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let raw = sample_raw();
        let cleaned = CleanedArticle::from_raw(raw, "text".to_string(), "h".to_string(), false);
        let normalized = NormalizedArticle::from_cleaned(
            cleaned,
            "en".to_string(),
            None,
            None,
            1,
            Metadata::new(),
        );
        let value = serde_json::to_value(&normalized).unwrap();
        assert!(value.get("translated_title").unwrap().is_null());
        assert!(value.get("translated_text").unwrap().is_null());
    }
}

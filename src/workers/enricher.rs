//! Enricher worker
//!
//! Consumes normalized articles and produces summary, topics, entities,
//! sentiment, and embeddings. The five model calls per article run
//! concurrently; each falls back independently on failure. Without an LLM
//! credential the worker runs in deterministic pass-through mode so the
//! downstream index is always populated.

use chrono::Utc;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bus::{BusConsumer, ResilientPublisher};
use crate::error::Result;
use crate::llm::{GeminiClient, EMBEDDING_MODEL, GENERATION_MODEL};
use crate::metrics::{self, STAGE_ENRICH};
use crate::schemas::{EnrichedArticle, Enrichment, NormalizedArticle, Sentiment};
use crate::text;

/// Per-task character caps applied before model submission
const SUMMARY_TEXT_CHARS: usize = 2000;
const TOPICS_TEXT_CHARS: usize = 2000;
const ENTITIES_TEXT_CHARS: usize = 2000;
const SENTIMENT_TEXT_CHARS: usize = 1500;
const EMBEDDING_TEXT_CHARS: usize = 1000;

const MAX_TOPICS: usize = 5;
const MAX_ENTITIES: usize = 10;

/// Pass-through summary length
const PASSTHROUGH_SUMMARY_CHARS: usize = 200;

/// Enrichment capability, fixed at construction time
pub enum EnricherMode {
    Model(GeminiClient),
    PassThrough,
}

pub struct EnricherWorker {
    mode: EnricherMode,
    embedding_dimension: usize,
    publisher: ResilientPublisher,
    output_topic: String,
}

impl EnricherWorker {
    pub fn new(
        mode: EnricherMode,
        embedding_dimension: usize,
        publisher: ResilientPublisher,
        output_topic: &str,
    ) -> Self {
        Self {
            mode,
            embedding_dimension,
            publisher,
            output_topic: output_topic.to_string(),
        }
    }

    /// Consumes the normalized topic until shutdown
    pub async fn run(
        &self,
        mut consumer: Box<dyn BusConsumer>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        match self.mode {
            EnricherMode::Model(_) => info!("Starting enricher with LLM enrichment"),
            EnricherMode::PassThrough => {
                warn!("No LLM credential configured, running in pass-through mode")
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Enricher shutting down");
                    break;
                }
                record = consumer.recv() => {
                    let record = match record {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(error = %e, "Consumer error");
                            metrics::record_error(STAGE_ENRICH, "consume");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let Some(normalized) =
                        super::decode_record::<NormalizedArticle>(&record, STAGE_ENRICH)
                    else {
                        continue;
                    };

                    let enriched = self.process(normalized).await;
                    info!(
                        article_id = %enriched.id,
                        topics = enriched.topics.len(),
                        entities = enriched.entities.len(),
                        sentiment = %enriched.sentiment,
                        "Enriched article"
                    );

                    if let Err(e) = self
                        .publisher
                        .publish_json(&self.output_topic, &enriched.id, &enriched)
                        .await
                    {
                        warn!(article_id = %enriched.id, error = %e, "Publish failed");
                        metrics::record_error(STAGE_ENRICH, "publish");
                    }
                }
            }
        }

        self.publisher.close().await?;
        Ok(())
    }

    /// Enriches one normalized article. Never drops: every failure path
    /// produces a usable field.
    pub async fn process(&self, normalized: NormalizedArticle) -> EnrichedArticle {
        let _timer = metrics::StageTimer::new(STAGE_ENRICH);
        metrics::record_article_processed(STAGE_ENRICH, &normalized.source);

        match &self.mode {
            EnricherMode::PassThrough => self.pass_through(normalized),
            EnricherMode::Model(llm) => self.enrich_with_model(llm, normalized).await,
        }
    }

    /// Deterministic enrichment used when no model is available
    fn pass_through(&self, normalized: NormalizedArticle) -> EnrichedArticle {
        debug!(article_id = %normalized.id, "Pass-through enrichment");

        let summary = if normalized.text.chars().count() > PASSTHROUGH_SUMMARY_CHARS {
            format!(
                "{}...",
                text::truncate_chars(&normalized.text, PASSTHROUGH_SUMMARY_CHARS)
            )
        } else {
            normalized.text.clone()
        };

        let metadata = enrichment_metadata(&normalized, "pass-through", "none");

        EnrichedArticle::from_normalized(
            normalized,
            Enrichment {
                summary,
                topics: vec!["general".to_string(), "news".to_string()],
                entities: vec![],
                sentiment: Sentiment::Neutral,
                sentiment_score: 0.0,
                embeddings: vec![],
            },
            metadata,
        )
    }

    async fn enrich_with_model(
        &self,
        llm: &GeminiClient,
        normalized: NormalizedArticle,
    ) -> EnrichedArticle {
        // Model inputs prefer the translated rendition when present
        let title = normalized
            .translated_title
            .as_deref()
            .unwrap_or(&normalized.title);
        let body = normalized
            .translated_text
            .as_deref()
            .unwrap_or(&normalized.text);

        debug!(article_id = %normalized.id, "Enriching article");

        let (summary, topics, entities, (sentiment, sentiment_score), embeddings) = tokio::join!(
            self.generate_summary(llm, title, body),
            self.extract_topics(llm, title, body),
            self.extract_entities(llm, title, body),
            self.analyze_sentiment(llm, title, body),
            self.generate_embeddings(llm, body),
        );

        let metadata = enrichment_metadata(&normalized, GENERATION_MODEL, EMBEDDING_MODEL);

        EnrichedArticle::from_normalized(
            normalized,
            Enrichment {
                summary,
                topics,
                entities,
                sentiment,
                sentiment_score,
                embeddings,
            },
            metadata,
        )
    }

    async fn generate_summary(&self, llm: &GeminiClient, title: &str, body: &str) -> String {
        let prompt = format!(
            "Summarize the following news article in 1-2 clear, concise sentences. \
             Focus on the key facts and main points.\n\n\
             Title: {}\nText: {}\n\nSummary:",
            title,
            text::truncate_for_model(body, SUMMARY_TEXT_CHARS)
        );

        match llm.generate(&prompt).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Summary generation failed, using leading sentences");
                metrics::record_error(STAGE_ENRICH, "summary");
                text::leading_sentences(body, 2).unwrap_or_else(|| title.to_string())
            }
        }
    }

    async fn extract_topics(&self, llm: &GeminiClient, title: &str, body: &str) -> Vec<String> {
        let prompt = format!(
            "Extract 3-5 main topics from the following news article. \
             Return topics as a comma-separated list. Use single words or short phrases. \
             Focus on: people, places, organizations, events, themes.\n\n\
             Title: {}\nText: {}\n\nTopics:",
            title,
            text::truncate_for_model(body, TOPICS_TEXT_CHARS)
        );

        match llm.generate(&prompt).await {
            Ok(result) => parse_comma_list(&result, MAX_TOPICS),
            Err(e) => {
                warn!(error = %e, "Topic extraction failed");
                metrics::record_error(STAGE_ENRICH, "topics");
                vec![]
            }
        }
    }

    async fn extract_entities(&self, llm: &GeminiClient, title: &str, body: &str) -> Vec<String> {
        let prompt = format!(
            "Extract named entities from the following news article. \
             Return entities as a comma-separated list. \
             Focus on: person names, company names, location names, organization names.\n\n\
             Title: {}\nText: {}\n\nEntities:",
            title,
            text::truncate_for_model(body, ENTITIES_TEXT_CHARS)
        );

        match llm.generate(&prompt).await {
            Ok(result) => parse_comma_list(&result, MAX_ENTITIES),
            Err(e) => {
                warn!(error = %e, "Entity extraction failed");
                metrics::record_error(STAGE_ENRICH, "entities");
                vec![]
            }
        }
    }

    async fn analyze_sentiment(
        &self,
        llm: &GeminiClient,
        title: &str,
        body: &str,
    ) -> (Sentiment, f64) {
        let prompt = format!(
            "Analyze the sentiment of the following news article. \
             Respond with ONLY one word: positive, negative, or neutral. \
             Consider the overall tone and emotional impact of the article.\n\n\
             Title: {}\nText: {}\n\nSentiment:",
            title,
            text::truncate_for_model(body, SENTIMENT_TEXT_CHARS)
        );

        match llm.generate(&prompt).await {
            Ok(result) => parse_sentiment(&result),
            Err(e) => {
                warn!(error = %e, "Sentiment analysis failed");
                metrics::record_error(STAGE_ENRICH, "sentiment");
                (Sentiment::Neutral, 0.5)
            }
        }
    }

    async fn generate_embeddings(&self, llm: &GeminiClient, body: &str) -> Vec<f32> {
        let input = text::truncate_for_model(body, EMBEDDING_TEXT_CHARS);

        match llm.embed(&input).await {
            Ok(embeddings) if embeddings.len() == self.embedding_dimension => embeddings,
            Ok(embeddings) => {
                warn!(
                    got = embeddings.len(),
                    expected = self.embedding_dimension,
                    "Embedding dimension mismatch, using zero vector"
                );
                metrics::record_error(STAGE_ENRICH, "embeddings");
                vec![0.0; self.embedding_dimension]
            }
            Err(e) => {
                warn!(error = %e, "Embedding generation failed, using zero vector");
                metrics::record_error(STAGE_ENRICH, "embeddings");
                vec![0.0; self.embedding_dimension]
            }
        }
    }
}

/// Appends the enrichment block to the article metadata
fn enrichment_metadata(
    normalized: &NormalizedArticle,
    model: &str,
    embedding_model: &str,
) -> crate::schemas::Metadata {
    let mut metadata = normalized.metadata.clone();
    metadata.insert(
        "enrichment".to_string(),
        json!({
            "enriched_at": Utc::now().to_rfc3339(),
            "model": model,
            "embedding_model": embedding_model,
        }),
    );
    metadata
}

/// Parses a comma-separated model response, dropping short fragments
fn parse_comma_list(result: &str, cap: usize) -> Vec<String> {
    result
        .split(',')
        .map(str::trim)
        .filter(|item| item.chars().count() >= 2)
        .map(|item| item.to_string())
        .take(cap)
        .collect()
}

/// Keyword-matches the model's sentiment verdict
fn parse_sentiment(result: &str) -> (Sentiment, f64) {
    let verdict = result.trim().to_lowercase();
    if verdict.contains("positive") {
        (Sentiment::Positive, 0.8)
    } else if verdict.contains("negative") {
        (Sentiment::Negative, 0.8)
    } else {
        (Sentiment::Neutral, 0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusConsumer, MessageBus};
    use crate::schemas::Metadata;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullBus;

    #[async_trait]
    impl MessageBus for NullBus {
        async fn publish(&self, _t: &str, _k: &str, _p: &[u8]) -> crate::error::Result<()> {
            Ok(())
        }

        async fn subscribe(
            &self,
            _topics: &[&str],
            _group: &str,
        ) -> crate::error::Result<Box<dyn BusConsumer>> {
            unimplemented!()
        }

        async fn is_healthy(&self) -> bool {
            true
        }

        fn bus_type(&self) -> &'static str {
            "test"
        }

        async fn close(&self) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn pass_through_worker() -> EnricherWorker {
        EnricherWorker::new(
            EnricherMode::PassThrough,
            768,
            ResilientPublisher::with_defaults(Arc::new(NullBus)),
            "enriched_articles",
        )
    }

    fn normalized_article(text: &str) -> NormalizedArticle {
        NormalizedArticle {
            id: "article-1".to_string(),
            url: "https://example.com/a".to_string(),
            title: "A Story".to_string(),
            text: text.to_string(),
            author: None,
            source: "example.com".to_string(),
            published_at: chrono::Utc::now(),
            scraped_at: chrono::Utc::now(),
            content_hash: "hash".to_string(),
            language: "en".to_string(),
            translated_title: None,
            translated_text: None,
            word_count: text.split_whitespace().count(),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_pass_through_long_text() {
        let worker = pass_through_worker();
        let body = "x".repeat(500);

        let enriched = worker.process(normalized_article(&body)).await;

        assert_eq!(enriched.summary.chars().count(), 203);
        assert!(enriched.summary.ends_with("..."));
        assert_eq!(enriched.topics, vec!["general", "news"]);
        assert!(enriched.entities.is_empty());
        assert_eq!(enriched.sentiment, Sentiment::Neutral);
        assert_eq!(enriched.sentiment_score, 0.0);
        assert!(enriched.embeddings.is_empty());
    }

    #[tokio::test]
    async fn test_pass_through_short_text_not_truncated() {
        let worker = pass_through_worker();
        let body = "Short article body.";

        let enriched = worker.process(normalized_article(body)).await;
        assert_eq!(enriched.summary, body);
    }

    #[tokio::test]
    async fn test_pass_through_is_deterministic() {
        let worker = pass_through_worker();
        let body = "The committee approved the measure unanimously after review.";

        let a = worker.process(normalized_article(body)).await;
        let b = worker.process(normalized_article(body)).await;

        assert_eq!(a.summary, b.summary);
        assert_eq!(a.topics, b.topics);
        assert_eq!(a.sentiment, b.sentiment);
        assert_eq!(a.embeddings, b.embeddings);
    }

    #[tokio::test]
    async fn test_pass_through_metadata_block() {
        let worker = pass_through_worker();
        let enriched = worker.process(normalized_article("body text")).await;

        let enrichment = enriched.metadata.get("enrichment").unwrap();
        assert_eq!(enrichment["model"], "pass-through");
        assert_eq!(enrichment["embedding_model"], "none");
        assert!(enrichment["enriched_at"].is_string());
    }

    #[test]
    fn test_parse_comma_list_caps_and_trims() {
        let parsed = parse_comma_list("ai, healthcare , x, machine learning, economy, policy, extra", 5);
        assert_eq!(
            parsed,
            vec!["ai", "healthcare", "machine learning", "economy", "policy"]
        );
    }

    #[test]
    fn test_parse_sentiment_keywords() {
        assert_eq!(parse_sentiment("Positive"), (Sentiment::Positive, 0.8));
        assert_eq!(parse_sentiment("  negative\n"), (Sentiment::Negative, 0.8));
        assert_eq!(parse_sentiment("mixed feelings"), (Sentiment::Neutral, 0.7));
    }
}

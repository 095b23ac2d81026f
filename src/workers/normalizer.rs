//! Normalizer worker
//!
//! Consumes cleaned articles, detects language, optionally translates to
//! the target language, counts words, and publishes normalized articles.

use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bus::{BusConsumer, ResilientPublisher};
use crate::error::Result;
use crate::lang;
use crate::metrics::{self, STAGE_NORMALIZE};
use crate::schemas::{CleanedArticle, NormalizedArticle};
use crate::text;
use crate::translate::Translator;

/// Detection confidence above which the translator's verdict wins
const DETECTION_CONFIDENCE_THRESHOLD: f64 = 0.8;
/// Only this many leading characters are submitted for detection
const DETECTION_SAMPLE_CHARS: usize = 1000;
/// Only this many leading characters of the text are translated
const TRANSLATION_TEXT_CHARS: usize = 2000;

pub struct NormalizerWorker {
    translator: Option<Translator>,
    target_language: String,
    publisher: ResilientPublisher,
    output_topic: String,
}

impl NormalizerWorker {
    pub fn new(
        translator: Option<Translator>,
        target_language: &str,
        publisher: ResilientPublisher,
        output_topic: &str,
    ) -> Self {
        Self {
            translator,
            target_language: target_language.to_string(),
            publisher,
            output_topic: output_topic.to_string(),
        }
    }

    /// Consumes the cleaned topic until shutdown
    pub async fn run(
        &self,
        mut consumer: Box<dyn BusConsumer>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!(
            translation_enabled = self.translator.is_some(),
            target_language = %self.target_language,
            "Starting normalizer"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Normalizer shutting down");
                    break;
                }
                record = consumer.recv() => {
                    let record = match record {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(error = %e, "Consumer error");
                            metrics::record_error(STAGE_NORMALIZE, "consume");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let Some(cleaned) = super::decode_record::<CleanedArticle>(&record, STAGE_NORMALIZE)
                    else {
                        continue;
                    };

                    let normalized = self.process(cleaned).await;
                    if let Err(e) = self
                        .publisher
                        .publish_json(&self.output_topic, &normalized.id, &normalized)
                        .await
                    {
                        warn!(article_id = %normalized.id, error = %e, "Publish failed");
                        metrics::record_error(STAGE_NORMALIZE, "publish");
                    }
                }
            }
        }

        self.publisher.close().await?;
        Ok(())
    }

    /// Normalizes one cleaned article. Translator failures degrade to
    /// detection-only output; nothing is dropped here.
    pub async fn process(&self, cleaned: CleanedArticle) -> NormalizedArticle {
        let _timer = metrics::StageTimer::new(STAGE_NORMALIZE);

        let language = self.detect_language(&cleaned.text).await;

        let (translated_title, translated_text) = if self.translator.is_some()
            && language != self.target_language
        {
            self.translate_fields(&cleaned.title, &cleaned.text).await
        } else {
            (None, None)
        };

        let word_count = text::count_words(&cleaned.text);

        let mut metadata = cleaned.metadata.clone();
        metadata.insert(
            "normalization".to_string(),
            json!({
                "detected_language": language,
                "translation_enabled": self.translator.is_some(),
                "target_language": if self.translator.is_some() {
                    Some(self.target_language.clone())
                } else {
                    None
                },
            }),
        );

        debug!(
            article_id = %cleaned.id,
            language = %language,
            word_count,
            "Normalized article"
        );
        metrics::record_article_processed(STAGE_NORMALIZE, &cleaned.source);

        NormalizedArticle::from_cleaned(
            cleaned,
            language,
            translated_title,
            translated_text,
            word_count,
            metadata,
        )
    }

    /// Statistical detection first; a high-confidence verdict from the
    /// translation service on the leading sample overrides it.
    async fn detect_language(&self, article_text: &str) -> String {
        let detected = lang::detect_language(article_text);

        if let Some(ref translator) = self.translator {
            let sample = text::truncate_chars(article_text, DETECTION_SAMPLE_CHARS);
            match translator.detect(sample).await {
                Ok(detection) if detection.confidence > DETECTION_CONFIDENCE_THRESHOLD => {
                    return detection.language;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Translator detection failed");
                }
            }
        }

        detected
    }

    async fn translate_fields(
        &self,
        title: &str,
        article_text: &str,
    ) -> (Option<String>, Option<String>) {
        let Some(ref translator) = self.translator else {
            return (None, None);
        };

        let translated_title = self.translate_field(translator, title).await;

        let head = text::truncate_chars(article_text, TRANSLATION_TEXT_CHARS);
        let translated_text = self.translate_field(translator, head).await;

        (translated_title, translated_text)
    }

    /// Translates a single field. The field is re-detected on its own: one
    /// already in the target language (an English title inside a foreign
    /// article, say) yields None rather than a no-op translation.
    async fn translate_field(&self, translator: &Translator, field: &str) -> Option<String> {
        let sample = text::truncate_chars(field, DETECTION_SAMPLE_CHARS);
        match translator.detect(sample).await {
            Ok(detection) if detection.language == self.target_language => return None,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Field detection failed, skipping translation");
                metrics::record_error(STAGE_NORMALIZE, "translate");
                return None;
            }
        }

        match translator.translate(field, &self.target_language).await {
            Ok(translated) => Some(translated),
            Err(e) => {
                warn!(error = %e, "Translation failed");
                metrics::record_error(STAGE_NORMALIZE, "translate");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use crate::schemas::Metadata;
    use async_trait::async_trait;
    use chrono::Utc;
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

    fn cleaned_article(text: &str) -> CleanedArticle {
        let mut metadata = Metadata::new();
        metadata.insert("feed_url".to_string(), serde_json::json!("https://x.example"));
        CleanedArticle {
            id: "article-1".to_string(),
            url: "https://example.com/a".to_string(),
            title: "A Story".to_string(),
            text: text.to_string(),
            author: None,
            source: "example.com".to_string(),
            published_at: Utc::now(),
            scraped_at: Utc::now(),
            content_hash: "hash".to_string(),
            is_duplicate: false,
            metadata,
        }
    }

    fn test_worker() -> NormalizerWorker {
        NormalizerWorker::new(
            None,
            "en",
            ResilientPublisher::with_defaults(Arc::new(NullBus)),
            "normalized_articles",
        )
    }

    #[tokio::test]
    async fn test_word_count_law() {
        let worker = test_worker();
        let cleaned = cleaned_article("the quick brown fox jumps over the lazy dog");

        let normalized = worker.process(cleaned).await;
        assert_eq!(normalized.word_count, 9);
    }

    #[tokio::test]
    async fn test_english_detection_without_translator() {
        let worker = test_worker();
        let cleaned = cleaned_article(
            "The government announced new economic measures today to support \
             businesses across the country during the downturn.",
        );

        let normalized = worker.process(cleaned).await;
        assert_eq!(normalized.language, "en");
        assert!(normalized.translated_title.is_none());
        assert!(normalized.translated_text.is_none());
    }

    #[tokio::test]
    async fn test_metadata_nests_without_overwriting() {
        let worker = test_worker();
        let cleaned = cleaned_article("some english words for the detector to chew on here");

        let normalized = worker.process(cleaned).await;
        // Earlier keys survive
        assert!(normalized.metadata.contains_key("feed_url"));
        let normalization = normalized.metadata.get("normalization").unwrap();
        assert_eq!(normalization["translation_enabled"], false);
    }

    #[tokio::test]
    async fn test_idempotent_on_same_input() {
        let worker = test_worker();
        let text = "The parliament passed the measure after a long debate over funding.";

        let a = worker.process(cleaned_article(text)).await;
        let b = worker.process(cleaned_article(text)).await;

        assert_eq!(a.language, b.language);
        assert_eq!(a.word_count, b.word_count);
        assert_eq!(
            serde_json::to_value(&a.metadata).unwrap(),
            serde_json::to_value(&b.metadata).unwrap()
        );
    }
}

//! Parser/deduper worker
//!
//! Consumes raw articles, strips markup, rejects too-short content, and
//! drops duplicates within the rolling window before publishing cleaned
//! articles.

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::bus::{BusConsumer, ResilientPublisher};
use crate::dedup::{content_hash, DedupStore};
use crate::error::Result;
use crate::metrics::{self, STAGE_CLEAN};
use crate::schemas::{CleanedArticle, RawArticle};
use crate::text;

/// Articles whose cleaned text is shorter than this are rejected
const MIN_TEXT_LENGTH: usize = 100;

pub struct ParserWorker {
    dedup: DedupStore,
    publisher: ResilientPublisher,
    output_topic: String,
}

impl ParserWorker {
    pub fn new(dedup: DedupStore, publisher: ResilientPublisher, output_topic: &str) -> Self {
        Self {
            dedup,
            publisher,
            output_topic: output_topic.to_string(),
        }
    }

    /// Consumes the raw topic until shutdown
    pub async fn run(
        &self,
        mut consumer: Box<dyn BusConsumer>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Starting parser/deduper");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Parser/deduper shutting down");
                    break;
                }
                record = consumer.recv() => {
                    let record = match record {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(error = %e, "Consumer error");
                            metrics::record_error(STAGE_CLEAN, "consume");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let Some(raw) = super::decode_record::<RawArticle>(&record, STAGE_CLEAN) else {
                        continue;
                    };

                    match self.process(raw).await {
                        Ok(Some(cleaned)) => {
                            if let Err(e) = self
                                .publisher
                                .publish_json(&self.output_topic, &cleaned.id, &cleaned)
                                .await
                            {
                                warn!(article_id = %cleaned.id, error = %e, "Publish failed");
                                metrics::record_error(STAGE_CLEAN, "publish");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(error = %e, "Failed to process article");
                            metrics::record_error(STAGE_CLEAN, "process");
                        }
                    }
                }
            }
        }

        self.publisher.close().await?;
        Ok(())
    }

    /// Cleans and dedups one raw article. Returns None when the article is
    /// rejected (too short) or dropped as a duplicate.
    pub async fn process(&self, raw: RawArticle) -> Result<Option<CleanedArticle>> {
        let _timer = metrics::StageTimer::new(STAGE_CLEAN);

        let cleaned_text = text::clean_html(&raw.content);

        let char_count = cleaned_text.chars().count();
        if char_count < MIN_TEXT_LENGTH {
            warn!(
                article_id = %raw.id,
                length = char_count,
                "Rejecting article with too-short content"
            );
            metrics::record_article_dropped(STAGE_CLEAN, "too_short");
            return Ok(None);
        }

        let hash = content_hash(&raw.title, &cleaned_text);

        if self.dedup.check_and_mark(&hash).await {
            info!(article_id = %raw.id, source = %raw.source, "Skipping duplicate article");
            metrics::record_dedup_hit(&raw.source);
            metrics::record_article_dropped(STAGE_CLEAN, "duplicate");
            return Ok(None);
        }

        metrics::record_article_processed(STAGE_CLEAN, &raw.source);
        Ok(Some(CleanedArticle::from_raw(raw, cleaned_text, hash, false)))
    }
}

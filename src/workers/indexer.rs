//! Indexer worker
//!
//! Consumes enriched articles, buffers them into bounded batches, and
//! bulk-writes them to the monthly search index. Document id = article id,
//! so at-least-once redelivery upstream results in idempotent overwrites.

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::bus::BusConsumer;
use crate::error::Result;
use crate::metrics::{self, STAGE_INDEX};
use crate::schemas::EnrichedArticle;
use crate::search::SearchStore;

/// How long the batch may sit idle before a flush
const IDLE_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

pub struct IndexerWorker {
    store: SearchStore,
    batch_size: usize,
    batch: Vec<EnrichedArticle>,
    /// Months whose index existence has already been ensured
    ensured_indices: HashSet<String>,
}

impl IndexerWorker {
    pub fn new(store: SearchStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            batch: Vec::with_capacity(batch_size),
            ensured_indices: HashSet::new(),
        }
    }

    /// Consumes the enriched topic until shutdown, flushing the pending
    /// batch before exit
    pub async fn run(
        &mut self,
        mut consumer: Box<dyn BusConsumer>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!(batch_size = self.batch_size, "Starting indexer");

        // Template install is idempotent; a failure here degrades to
        // whatever mapping the cluster infers
        if let Err(e) = self.store.put_index_template().await {
            warn!(error = %e, "Failed to install index template");
        }

        let mut idle = tokio::time::interval(IDLE_FLUSH_INTERVAL);
        idle.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Indexer shutting down, flushing pending batch");
                    self.flush().await;
                    break;
                }
                record = consumer.recv() => {
                    let record = match record {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(error = %e, "Consumer error");
                            metrics::record_error(STAGE_INDEX, "consume");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let Some(article) =
                        super::decode_record::<EnrichedArticle>(&record, STAGE_INDEX)
                    else {
                        continue;
                    };

                    debug!(article_id = %article.id, "Queued article for indexing");
                    self.batch.push(article);

                    if self.batch.len() >= self.batch_size {
                        self.flush().await;
                    }
                }
                _ = idle.tick() => {
                    if !self.batch.is_empty() {
                        self.flush().await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Writes the pending batch to the current monthly index.
    ///
    /// On failure the batch is cleared and logged; replay is left to the
    /// bus's at-least-once delivery.
    pub async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let _timer = metrics::StageTimer::new(STAGE_INDEX);
        let index = self.store.monthly_index(chrono::Utc::now());

        if !self.ensured_indices.contains(&index) {
            match self.store.ensure_index(&index).await {
                Ok(()) => {
                    self.ensured_indices.insert(index.clone());
                }
                Err(e) => {
                    warn!(index = %index, error = %e, "Failed to ensure index exists");
                }
            }
        }

        let count = self.batch.len();
        match self.store.bulk_index(&index, &self.batch).await {
            Ok(summary) => {
                info!(
                    index = %index,
                    indexed = summary.indexed,
                    failed = summary.failed,
                    "Bulk indexed articles"
                );
                for article in &self.batch {
                    metrics::record_article_processed(STAGE_INDEX, &article.source);
                }
                metrics::record_batch_flush("success");
            }
            Err(e) => {
                error!(index = %index, count, error = %e, "Bulk indexing failed, dropping batch");
                metrics::record_batch_flush("failure");
                metrics::record_error(STAGE_INDEX, "bulk");
            }
        }

        self.batch.clear();
    }

    /// Number of articles waiting in the batch
    pub fn pending(&self) -> usize {
        self.batch.len()
    }
}

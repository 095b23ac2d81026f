//! Ingestor worker
//!
//! Fetches all configured sources in parallel on a fixed cadence and
//! publishes the resulting raw articles keyed by id. Per-source failures
//! are isolated; a whole-cycle failure backs off for a minute. A cycle that
//! overruns its interval is not caught up.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::bus::ResilientPublisher;
use crate::config::Config;
use crate::error::Result;
use crate::http::{HttpClientConfig, ResilientHttpClient};
use crate::metrics::{self, STAGE_INGEST};
use crate::sources::{HeadlineApiSource, RssSource, Source};

const CYCLE_RETRY_DELAY: Duration = Duration::from_secs(60);
const FEED_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Ingestor {
    sources: Vec<Box<dyn Source>>,
    publisher: ResilientPublisher,
    topic: String,
    interval: Duration,
}

impl Ingestor {
    /// Builds the source set from configuration: one RSS source per feed
    /// URL plus the headline API when a key is present
    pub fn from_config(config: &Config, publisher: ResilientPublisher) -> Result<Self> {
        let http = Arc::new(ResilientHttpClient::new(HttpClientConfig::single_attempt(
            FEED_TIMEOUT,
            config.max_concurrent_requests,
        ))?);

        let mut sources: Vec<Box<dyn Source>> = config
            .feeds()
            .iter()
            .map(|url| Box::new(RssSource::new(http.clone(), url)) as Box<dyn Source>)
            .collect();

        if let Some(ref api_key) = config.newsapi_key {
            sources.push(Box::new(HeadlineApiSource::new(http.clone(), api_key)));
            info!("Headline API source enabled");
        }

        Ok(Self {
            sources,
            publisher,
            topic: config.kafka_topic_raw_articles.clone(),
            interval: Duration::from_secs(config.ingest_interval_minutes * 60),
        })
    }

    pub fn new(
        sources: Vec<Box<dyn Source>>,
        publisher: ResilientPublisher,
        topic: &str,
        interval: Duration,
    ) -> Self {
        Self {
            sources,
            publisher,
            topic: topic.to_string(),
            interval,
        }
    }

    /// Runs the periodic fetch loop until shutdown
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            sources = self.sources.len(),
            interval_secs = self.interval.as_secs(),
            "Starting ingestor"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Ingestor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "Ingestion cycle failed, backing off");
                        metrics::record_error(STAGE_INGEST, "cycle");
                        tokio::time::sleep(CYCLE_RETRY_DELAY).await;
                    }
                }
            }
        }

        self.publisher.close().await?;
        Ok(())
    }

    /// One fetch-and-publish cycle across all sources
    pub async fn run_cycle(&self) -> Result<()> {
        let _timer = metrics::StageTimer::new(STAGE_INGEST);
        info!("Starting ingestion cycle");

        // All sources fetch in parallel; one failure does not cancel siblings
        let fetches = self.sources.iter().map(|source| async move {
            (source.name().to_string(), source.fetch().await)
        });
        let outcomes = futures::future::join_all(fetches).await;

        let mut published = 0usize;
        let mut sources_ok = 0usize;
        for (name, outcome) in outcomes {
            match outcome {
                Ok(articles) => {
                    sources_ok += 1;
                    for article in articles {
                        match self
                            .publisher
                            .publish_json(&self.topic, &article.id, &article)
                            .await
                        {
                            Ok(()) => {
                                metrics::record_article_processed(STAGE_INGEST, &article.source);
                                published += 1;
                            }
                            Err(e) => {
                                error!(
                                    article_id = %article.id,
                                    error = %e,
                                    "Failed to publish raw article"
                                );
                                metrics::record_error(STAGE_INGEST, "publish");
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "Source fetch failed");
                    metrics::record_error(STAGE_INGEST, "fetch");
                }
            }
        }

        if !self.sources.is_empty() && sources_ok == 0 {
            return Err(crate::error::PipelineError::FeedError(
                "every source failed this cycle".to_string(),
            ));
        }

        if published > 0 {
            info!(published, "Ingestion cycle completed");
        } else {
            warn!("No articles fetched in this cycle");
        }

        Ok(())
    }
}

//! Message bus abstraction
//!
//! Topic-per-stage publish/subscribe with consumer groups, keyed
//! partitioning by article id, and at-least-once delivery. Consumers are
//! expected to be idempotent on the article id.

mod kafka;

pub use kafka::{KafkaBus, TopicSpec};

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::metrics;

/// A record received from a topic
#[derive(Debug, Clone)]
pub struct BusRecord {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Message bus interface
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a payload to a topic, partitioned by key
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()>;

    /// Creates a consumer-group subscription over the given topics
    async fn subscribe(&self, topics: &[&str], group: &str) -> Result<Box<dyn BusConsumer>>;

    /// Health check (bounded to 2 seconds)
    async fn is_healthy(&self) -> bool;

    /// Bus backend identifier for metrics
    fn bus_type(&self) -> &'static str;

    /// Flushes outstanding publishes and closes the producer
    async fn close(&self) -> Result<()>;
}

/// Consumer interface for reading records
#[async_trait]
pub trait BusConsumer: Send {
    /// Receives the next record, waiting until one arrives
    async fn recv(&mut self) -> Result<BusRecord>;
}

/// Publisher with bounded linear-backoff retry above the bus adapter.
///
/// Transient publish failures are retried up to `max_retries` times with
/// linearly increasing delay, then surfaced as a terminal publish error.
pub struct ResilientPublisher {
    bus: std::sync::Arc<dyn MessageBus>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ResilientPublisher {
    pub fn new(bus: std::sync::Arc<dyn MessageBus>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            bus,
            max_retries,
            retry_delay,
        }
    }

    /// Default publish policy: 3 retries at 100 ms increments
    pub fn with_defaults(bus: std::sync::Arc<dyn MessageBus>) -> Self {
        Self::new(bus, 3, Duration::from_millis(100))
    }

    /// Publishes raw bytes with automatic retry
    pub async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let bus_type = self.bus.bus_type();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let start = std::time::Instant::now();

            match self.bus.publish(topic, key, payload).await {
                Ok(()) => {
                    metrics::record_publish_latency(bus_type, start.elapsed().as_secs_f64());
                    metrics::record_publish_success(bus_type);
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }

            if attempt < self.max_retries {
                let delay = self.retry_delay * (attempt + 1);
                tokio::time::sleep(delay).await;
            }
        }

        metrics::record_publish_failure(bus_type);
        Err(PipelineError::PublishError {
            attempts: self.max_retries + 1,
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Serializes a record as JSON and publishes it keyed by article id
    pub async fn publish_json<T: Serialize>(&self, topic: &str, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish(topic, key, &payload).await
    }

    pub async fn is_healthy(&self) -> bool {
        self.bus.is_healthy().await
    }

    pub async fn close(&self) -> Result<()> {
        self.bus.close().await
    }
}

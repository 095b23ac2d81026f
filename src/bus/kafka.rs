//! Kafka message bus implementation
//!
//! Producer semantics: acks=all, bounded retries with linear backoff,
//! gzip compression, 10s publish timeout. Consumer semantics: consumer
//! groups with auto-commit at a 1s cadence and earliest-offset reset for
//! new groups, which together give at-least-once delivery.

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::Message;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{BusConsumer, BusRecord, MessageBus};
use crate::error::{PipelineError, Result};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Retention and partitioning for a stage topic
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub retention_days: i64,
}

impl TopicSpec {
    pub fn new(name: &str, retention_days: i64) -> Self {
        Self {
            name: name.to_string(),
            partitions: 3,
            retention_days,
        }
    }
}

pub struct KafkaBus {
    producer: FutureProducer,
    bootstrap_servers: String,
}

impl KafkaBus {
    /// Connects a producer to the cluster
    pub fn connect(bootstrap_servers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("acks", "all")
            .set("retries", "3")
            .set("retry.backoff.ms", "100")
            .set("compression.type", "gzip")
            .set("message.timeout.ms", "10000")
            .create()?;

        info!(servers = %bootstrap_servers, "Connected Kafka producer");

        Ok(Self {
            producer,
            bootstrap_servers: bootstrap_servers.to_string(),
        })
    }

    /// Creates the stage topics, ignoring those that already exist
    pub async fn ensure_topics(&self, specs: &[TopicSpec]) -> Result<()> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .create()?;

        let retention_strings: Vec<String> = specs
            .iter()
            .map(|s| (s.retention_days * 24 * 60 * 60 * 1000).to_string())
            .collect();

        let topics: Vec<NewTopic> = specs
            .iter()
            .zip(retention_strings.iter())
            .map(|(spec, retention_ms)| {
                NewTopic::new(&spec.name, spec.partitions, TopicReplication::Fixed(1))
                    .set("retention.ms", retention_ms)
                    .set("compression.type", "gzip")
            })
            .collect();

        let results = admin.create_topics(topics.iter(), &AdminOptions::new()).await?;

        for result in results {
            match result {
                Ok(name) => info!(topic = %name, "Created topic"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!(topic = %name, "Topic already exists");
                }
                Err((name, code)) => {
                    return Err(PipelineError::ValidationError(format!(
                        "failed to create topic {}: {}",
                        name, code
                    )));
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(PUBLISH_TIMEOUT)).await {
            Ok((partition, offset)) => {
                debug!(topic, key, partition, offset, "Published record");
                Ok(())
            }
            Err((e, _)) => Err(PipelineError::BusError(e)),
        }
    }

    async fn subscribe(&self, topics: &[&str], group: &str) -> Result<Box<dyn BusConsumer>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", group)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "1000")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(topics)?;

        info!(group, ?topics, "Subscribed consumer group");

        Ok(Box::new(KafkaBusConsumer { consumer }))
    }

    async fn is_healthy(&self) -> bool {
        let producer = self.producer.clone();
        let result = tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(None, HEALTH_TIMEOUT)
        })
        .await;

        matches!(result, Ok(Ok(_)))
    }

    fn bus_type(&self) -> &'static str {
        "kafka"
    }

    async fn close(&self) -> Result<()> {
        let producer = self.producer.clone();
        let result =
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(PUBLISH_TIMEOUT)))
                .await;

        match result {
            Ok(Ok(())) => {
                info!("Kafka producer flushed and closed");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Producer flush failed during close");
                Err(PipelineError::BusError(e))
            }
            Err(e) => Err(PipelineError::ValidationError(format!(
                "flush task failed: {}",
                e
            ))),
        }
    }
}

pub struct KafkaBusConsumer {
    consumer: StreamConsumer,
}

#[async_trait]
impl BusConsumer for KafkaBusConsumer {
    async fn recv(&mut self) -> Result<BusRecord> {
        let message = self.consumer.recv().await?;

        let key = message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned());
        let payload = message.payload().map(|p| p.to_vec()).unwrap_or_default();

        Ok(BusRecord {
            topic: message.topic().to_string(),
            key,
            payload,
        })
    }
}

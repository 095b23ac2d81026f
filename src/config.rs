//! Configuration for the pipeline services

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Message bus
    #[serde(default = "default_kafka_bootstrap_servers")]
    pub kafka_bootstrap_servers: String,
    #[serde(default = "default_topic_raw")]
    pub kafka_topic_raw_articles: String,
    #[serde(default = "default_topic_cleaned")]
    pub kafka_topic_cleaned_articles: String,
    #[serde(default = "default_topic_normalized")]
    pub kafka_topic_normalized_articles: String,
    #[serde(default = "default_topic_enriched")]
    pub kafka_topic_enriched_articles: String,

    // Search store
    #[serde(default = "default_elasticsearch_host")]
    pub elasticsearch_host: String,
    #[serde(default = "default_index_pattern")]
    pub elasticsearch_index_pattern: String,
    #[serde(default = "default_es_batch_size")]
    pub es_batch_size: usize,

    // Dedup KV store
    #[serde(default = "default_redis_host")]
    pub redis_host: String,
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,
    #[serde(default = "default_dedup_window_hours")]
    pub dedup_window_hours: u64,
    #[serde(default = "default_dedup_cache_size")]
    pub dedup_cache_size: usize,

    // Ingestion
    pub rss_feeds: Option<String>,
    #[serde(default = "default_ingest_interval_minutes")]
    pub ingest_interval_minutes: u64,
    pub newsapi_key: Option<String>,

    // Normalization
    #[serde(default)]
    pub enable_translation: bool,
    #[serde(default = "default_target_language")]
    pub target_language: String,

    // Enrichment
    pub google_api_key: Option<String>,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    // Query API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    // Concurrency
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    // Metrics server
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_kafka_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_topic_raw() -> String {
    "raw_articles".to_string()
}

fn default_topic_cleaned() -> String {
    "cleaned_articles".to_string()
}

fn default_topic_normalized() -> String {
    "normalized_articles".to_string()
}

fn default_topic_enriched() -> String {
    "enriched_articles".to_string()
}

fn default_elasticsearch_host() -> String {
    "localhost:9200".to_string()
}

fn default_index_pattern() -> String {
    "news".to_string()
}

fn default_es_batch_size() -> usize {
    100
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_dedup_window_hours() -> u64 {
    24
}

fn default_dedup_cache_size() -> usize {
    10_000
}

fn default_ingest_interval_minutes() -> u64 {
    5
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_embedding_dimension() -> usize {
    768
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_enabled() -> bool {
    true
}

/// Built-in feed list used when RSS_FEEDS is not set.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://rss.cnn.com/rss/edition.rss",
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://www.reuters.com/tools/rss",
    "https://techcrunch.com/feed/",
    "https://feeds.npr.org/1001/rss.xml",
    "https://www.theguardian.com/international/rss",
    "https://nypost.com/feed/",
    "https://feeds.washingtonpost.com/rss/world",
];

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.es_batch_size == 0 {
            anyhow::bail!("ES_BATCH_SIZE must be at least 1");
        }
        if self.ingest_interval_minutes == 0 {
            anyhow::bail!("INGEST_INTERVAL_MINUTES must be at least 1");
        }
        if self.embedding_dimension == 0 {
            anyhow::bail!("EMBEDDING_DIMENSION must be at least 1");
        }
        Ok(())
    }

    /// Configured feed URLs, falling back to the built-in list
    pub fn feeds(&self) -> Vec<String> {
        match self.rss_feeds.as_deref() {
            Some(feeds) if !feeds.trim().is_empty() => feeds
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            _ => DEFAULT_FEEDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Search store endpoint with the http scheme prepended when missing
    pub fn elasticsearch_url(&self) -> String {
        let host = self.elasticsearch_host.trim();
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        }
    }

    /// Redis connection URL for the dedup store
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }

    /// Dedup TTL in seconds
    pub fn dedup_ttl_seconds(&self) -> u64 {
        self.dedup_window_hours * 3600
    }

    /// Checks if the headline API is configured
    pub fn has_newsapi(&self) -> bool {
        self.newsapi_key.is_some()
    }

    /// Checks if LLM enrichment is configured
    pub fn has_llm(&self) -> bool {
        self.google_api_key.is_some()
    }

    /// Translation requires both the flag and a credential
    pub fn translation_enabled(&self) -> bool {
        self.enable_translation && self.google_api_key.is_some()
    }

    /// All stage topics in pipeline order
    pub fn topics(&self) -> [&str; 4] {
        [
            &self.kafka_topic_raw_articles,
            &self.kafka_topic_cleaned_articles,
            &self.kafka_topic_normalized_articles,
            &self.kafka_topic_enriched_articles,
        ]
    }
}

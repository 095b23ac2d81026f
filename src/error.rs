//! Error types for the pipeline services

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Message bus error: {0}")]
    BusError(#[from] rdkafka::error::KafkaError),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: String, message: String },

    #[error("Search store error: {0}")]
    SearchError(String),

    #[error("Publish failed after {attempts} attempts: {message}")]
    PublishError { attempts: u32, message: String },

    #[error("Invalid data: {0}")]
    ValidationError(String),

    #[error("Feed parse error: {0}")]
    FeedError(String),

    #[error("Source not configured: {0}")]
    SourceNotConfigured(String),

    #[error("Translation error: {0}")]
    TranslationError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

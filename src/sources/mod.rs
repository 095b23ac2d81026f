//! Article sources for ingestion
//!
//! Each source implements the `Source` trait and produces `RawArticle`s for
//! one fetch cycle. Per-source failures are isolated by the ingestor.

pub mod newsapi;
pub mod rss;

use async_trait::async_trait;

use crate::error::Result;
use crate::schemas::RawArticle;

/// Trait for all article sources
#[async_trait]
pub trait Source: Send + Sync {
    /// Identifier used in logs and metrics
    fn name(&self) -> &str;

    /// Fetches one cycle's worth of articles
    async fn fetch(&self) -> Result<Vec<RawArticle>>;
}

/// Extracts the registered host from a URL for use as the source name
pub fn extract_domain(url_str: &str) -> String {
    url::Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url_str.to_string())
}

pub use newsapi::HeadlineApiSource;
pub use rss::RssSource;

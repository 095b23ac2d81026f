//! RSS/Atom feed source
//!
//! One source per configured feed URL. A fetch is a single GET with the
//! ingestor's 30s timeout; non-200 responses are logged and skipped until
//! the next cycle.

use async_trait::async_trait;
use chrono::Utc;
use feed_rs::model::Entry;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{extract_domain, Source};
use crate::error::{PipelineError, Result};
use crate::http::ResilientHttpClient;
use crate::schemas::{Metadata, RawArticle};

pub struct RssSource {
    client: Arc<ResilientHttpClient>,
    feed_url: String,
    source: String,
}

impl RssSource {
    pub fn new(client: Arc<ResilientHttpClient>, feed_url: &str) -> Self {
        Self {
            client,
            source: extract_domain(feed_url),
            feed_url: feed_url.to_string(),
        }
    }

    /// Maps a feed entry to a raw article, or None when the entry carries no
    /// usable link or title
    fn entry_to_article(&self, entry: Entry) -> Option<RawArticle> {
        let url = entry.links.first().map(|l| l.href.clone())?;
        let title = entry.title.as_ref().map(|t| t.content.clone())?;

        // Content preference: full content body, then summary
        let content = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();

        let published_at = entry.published.or(entry.updated).unwrap_or_else(Utc::now);

        let author = entry
            .authors
            .first()
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty());

        let mut metadata = Metadata::new();
        metadata.insert(
            "feed_url".to_string(),
            serde_json::json!(self.feed_url.clone()),
        );
        if !entry.categories.is_empty() {
            let tags: Vec<&str> = entry.categories.iter().map(|c| c.term.as_str()).collect();
            metadata.insert("tags".to_string(), serde_json::json!(tags));
        }

        Some(RawArticle::new(
            url,
            title,
            content,
            author,
            self.source.clone(),
            published_at,
            metadata,
        ))
    }
}

#[async_trait]
impl Source for RssSource {
    fn name(&self) -> &str {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        debug!(feed = %self.feed_url, "Fetching feed");

        let response = self.client.get(&self.feed_url).await?;
        let body = response.bytes().await?;

        let feed = feed_rs::parser::parse(&body[..])
            .map_err(|e| PipelineError::FeedError(format!("{}: {}", self.feed_url, e)))?;

        let mut articles = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            match self.entry_to_article(entry) {
                Some(article) => articles.push(article),
                None => {
                    warn!(feed = %self.feed_url, "Skipping entry without link or title");
                }
            }
        }

        info!(feed = %self.feed_url, articles = articles.len(), "Fetched feed");

        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpClientConfig, ResilientHttpClient};
    use std::time::Duration;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <link>https://news.example.com</link>
    <item>
      <title>Quantum Leap</title>
      <link>https://news.example.com/quantum-leap</link>
      <description>&lt;p&gt;Scientists made a discovery.&lt;/p&gt;</description>
      <pubDate>Wed, 15 Jan 2025 10:00:00 GMT</pubDate>
      <author>jane@example.com (Jane Doe)</author>
    </item>
    <item>
      <title>Second Story</title>
      <link>https://news.example.com/second</link>
      <description>Another report.</description>
    </item>
  </channel>
</rss>"#;

    fn test_source() -> RssSource {
        let client = Arc::new(
            ResilientHttpClient::new(HttpClientConfig::single_attempt(
                Duration::from_secs(30),
                4,
            ))
            .unwrap(),
        );
        RssSource::new(client, "https://news.example.com/rss.xml")
    }

    #[test]
    fn test_source_name_is_feed_host() {
        let source = test_source();
        assert_eq!(source.name(), "news.example.com");
    }

    #[test]
    fn test_entry_mapping() {
        let source = test_source();
        let feed = feed_rs::parser::parse(SAMPLE_RSS.as_bytes()).unwrap();

        let articles: Vec<RawArticle> = feed
            .entries
            .into_iter()
            .filter_map(|e| source.entry_to_article(e))
            .collect();

        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.title, "Quantum Leap");
        assert_eq!(first.url, "https://news.example.com/quantum-leap");
        assert_eq!(first.source, "news.example.com");
        assert!(first.content.contains("Scientists made a discovery."));
        assert_eq!(
            first.published_at.to_rfc3339(),
            "2025-01-15T10:00:00+00:00"
        );
        assert_eq!(
            first.metadata.get("feed_url").unwrap(),
            "https://news.example.com/rss.xml"
        );

        // Entry without a pubDate falls back to the scrape time
        let second = &articles[1];
        assert!(second.published_at <= Utc::now());
    }

    #[test]
    fn test_fresh_ids_per_entry() {
        let source = test_source();
        let feed = feed_rs::parser::parse(SAMPLE_RSS.as_bytes()).unwrap();
        let ids: Vec<String> = feed
            .entries
            .into_iter()
            .filter_map(|e| source.entry_to_article(e))
            .map(|a| a.id)
            .collect();
        assert_ne!(ids[0], ids[1]);
    }
}

//! In-memory mock corpus for the Query API
//!
//! Served when the search store is unreachable at startup, so local dev and
//! demos keep a working read path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;

use super::ArticleRepository;
use crate::error::Result;
use crate::schemas::{
    DailyCount, EnrichedArticle, Metadata, NamedCount, SearchRequest, SearchResponse, Sentiment,
    StatsResponse,
};

fn mock_article(
    id: &str,
    title: &str,
    text: &str,
    summary: &str,
    url: &str,
    published_at: &str,
    source: &str,
    author: &str,
    topics: &[&str],
    entities: &[&str],
    sentiment: Sentiment,
    sentiment_score: f64,
    word_count: usize,
) -> EnrichedArticle {
    let published_at: DateTime<Utc> = published_at.parse().expect("static timestamp");
    EnrichedArticle {
        id: id.to_string(),
        url: url.to_string(),
        title: title.to_string(),
        text: text.to_string(),
        author: Some(author.to_string()),
        source: source.to_string(),
        published_at,
        scraped_at: published_at,
        content_hash: crate::dedup::content_hash(title, text),
        language: "en".to_string(),
        translated_title: None,
        translated_text: None,
        word_count,
        summary: summary.to_string(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        entities: entities.iter().map(|e| e.to_string()).collect(),
        sentiment,
        sentiment_score,
        embeddings: vec![],
        metadata: Metadata::new(),
    }
}

/// The fixed demo corpus
pub fn mock_corpus() -> Vec<EnrichedArticle> {
    vec![
        mock_article(
            "1",
            "AI Revolution in Healthcare",
            "Artificial intelligence is transforming healthcare with new diagnostic \
             tools and treatment methods. Machine learning algorithms are now capable \
             of detecting diseases earlier than traditional methods.",
            "AI is revolutionizing healthcare through advanced diagnostic tools and \
             early disease detection capabilities.",
            "https://example.com/ai-healthcare",
            "2025-09-14T01:00:00Z",
            "TechNews",
            "Dr. Sarah Johnson",
            &["artificial intelligence", "healthcare", "technology"],
            &["AI", "machine learning", "healthcare"],
            Sentiment::Positive,
            0.8,
            150,
        ),
        mock_article(
            "2",
            "Climate Change Impact on Global Economy",
            "Recent studies show that climate change is having significant impacts on \
             the global economy, affecting agriculture, tourism, and energy sectors \
             worldwide.",
            "Climate change is significantly impacting global economy across multiple \
             sectors including agriculture and tourism.",
            "https://example.com/climate-economy",
            "2025-09-14T02:00:00Z",
            "Global News",
            "Maria Rodriguez",
            &["climate change", "economy", "environment"],
            &["climate", "economy", "agriculture", "tourism"],
            Sentiment::Negative,
            -0.6,
            200,
        ),
        mock_article(
            "3",
            "Space Exploration Breakthrough",
            "Scientists have made a groundbreaking discovery about exoplanets that \
             could change our understanding of life in the universe. The new findings \
             suggest habitable conditions may be more common than previously thought.",
            "New exoplanet research suggests habitable conditions may be more \
             widespread in the universe.",
            "https://example.com/space-discovery",
            "2025-09-14T03:00:00Z",
            "Science Daily",
            "Prof. Michael Chen",
            &["space", "science", "discovery"],
            &["exoplanets", "space", "universe", "science"],
            Sentiment::Positive,
            0.9,
            180,
        ),
    ]
}

/// Repository variant serving the fixed corpus
pub struct MockRepository {
    articles: Vec<EnrichedArticle>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            articles: mock_corpus(),
        }
    }

    fn matches(article: &EnrichedArticle, request: &SearchRequest) -> bool {
        if !request.query.is_empty() {
            let needle = request.query.to_lowercase();
            let hit = article.title.to_lowercase().contains(&needle)
                || article.text.to_lowercase().contains(&needle)
                || article.summary.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        if let Some(ref topics) = request.topics {
            let have: Vec<String> = article.topics.iter().map(|t| t.to_lowercase()).collect();
            if !topics.iter().any(|t| have.contains(&t.to_lowercase())) {
                return false;
            }
        }

        if let Some(ref sources) = request.sources {
            if !sources.contains(&article.source) {
                return false;
            }
        }

        if let Some(ref languages) = request.languages {
            if !languages.contains(&article.language) {
                return false;
            }
        }

        if let Some(sentiment) = request.sentiment {
            if article.sentiment != sentiment {
                return false;
            }
        }

        if let Some(from) = request.date_from {
            if article.published_at < from {
                return false;
            }
        }
        if let Some(to) = request.date_to {
            if article.published_at > to {
                return false;
            }
        }

        true
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleRepository for MockRepository {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();

        let mut matched: Vec<EnrichedArticle> = self
            .articles
            .iter()
            .filter(|a| Self::matches(a, &request))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        let total = matched.len() as u64;
        let page: Vec<EnrichedArticle> = matched
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .collect();

        Ok(SearchResponse {
            articles: page,
            total,
            page: request.page,
            size: request.size,
            took: start.elapsed().as_millis() as u64,
        })
    }

    async fn get_article(&self, id: &str) -> Result<Option<EnrichedArticle>> {
        Ok(self.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn latest(
        &self,
        limit: usize,
        source: Option<&str>,
        language: Option<&str>,
    ) -> Result<Vec<EnrichedArticle>> {
        let mut matched: Vec<EnrichedArticle> = self
            .articles
            .iter()
            .filter(|a| source.map_or(true, |s| a.source == s))
            .filter(|a| language.map_or(true, |l| a.language == l))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn stats(&self) -> Result<StatsResponse> {
        let mut sources: HashMap<&str, u64> = HashMap::new();
        let mut languages: HashMap<&str, u64> = HashMap::new();
        let mut sentiments: HashMap<&'static str, u64> = HashMap::new();
        let mut days: HashMap<String, u64> = HashMap::new();

        for article in &self.articles {
            *sources.entry(&article.source).or_default() += 1;
            *languages.entry(&article.language).or_default() += 1;
            *sentiments.entry(article.sentiment.as_str()).or_default() += 1;
            *days
                .entry(article.published_at.format("%Y-%m-%d").to_string())
                .or_default() += 1;
        }

        let mut daily_counts: Vec<DailyCount> = days
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect();
        daily_counts.sort_by(|a, b| b.date.cmp(&a.date));
        daily_counts.truncate(7);

        Ok(StatsResponse {
            total_articles: self.articles.len() as u64,
            sources: to_sorted_counts(sources),
            languages: to_sorted_counts(languages),
            sentiments: to_sorted_counts(sentiments),
            daily_counts,
        })
    }

    async fn health(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "unavailable",
            "message": "Running in mock mode"
        })
    }

    fn mode(&self) -> &'static str {
        "mock"
    }
}

fn to_sorted_counts(map: HashMap<&str, u64>) -> Vec<NamedCount> {
    let mut counts: Vec<NamedCount> = map
        .into_iter()
        .map(|(name, count)| NamedCount {
            name: name.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_has_ai_article() {
        let corpus = mock_corpus();
        assert!(corpus.iter().any(|a| a.title.contains("AI")));
    }

    #[tokio::test]
    async fn test_mock_search_by_query() {
        let repo = MockRepository::new();
        let response = repo
            .search(
                SearchRequest {
                    query: "AI".to_string(),
                    page: 1,
                    size: 10,
                    ..Default::default()
                }
                .clamped(),
            )
            .await
            .unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.articles[0].title, "AI Revolution in Healthcare");
    }

    #[tokio::test]
    async fn test_mock_search_source_and_sentiment_filters() {
        let repo = MockRepository::new();
        let response = repo
            .search(
                SearchRequest {
                    sources: Some(vec!["TechNews".to_string()]),
                    sentiment: Some(Sentiment::Positive),
                    page: 1,
                    size: 10,
                    ..Default::default()
                }
                .clamped(),
            )
            .await
            .unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.articles[0].source, "TechNews");
    }

    #[tokio::test]
    async fn test_mock_search_sorted_newest_first() {
        let repo = MockRepository::new();
        let response = repo
            .search(
                SearchRequest {
                    page: 1,
                    size: 10,
                    ..Default::default()
                }
                .clamped(),
            )
            .await
            .unwrap();

        assert_eq!(response.total, 3);
        let times: Vec<_> = response.articles.iter().map(|a| a.published_at).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_mock_get_article() {
        let repo = MockRepository::new();
        assert!(repo.get_article("1").await.unwrap().is_some());
        assert!(repo.get_article("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_latest_with_limit() {
        let repo = MockRepository::new();
        let latest = repo.latest(2, None, None).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].id, "3");
    }

    #[tokio::test]
    async fn test_mock_stats() {
        let repo = MockRepository::new();
        let stats = repo.stats().await.unwrap();

        assert_eq!(stats.total_articles, 3);
        assert_eq!(stats.sources.len(), 3);
        assert_eq!(stats.languages[0].name, "en");
        assert_eq!(stats.languages[0].count, 3);
        assert_eq!(stats.daily_counts.len(), 1);
        assert_eq!(stats.daily_counts[0].count, 3);

        let positive = stats
            .sentiments
            .iter()
            .find(|c| c.name == "positive")
            .unwrap();
        assert_eq!(positive.count, 2);
    }
}

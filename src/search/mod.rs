//! Search store client
//!
//! REST client for the Elasticsearch write and read paths: index template
//! management, idempotent monthly-index creation, bulk writes keyed by
//! article id, and the filtered query surface.

pub mod query;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::http::ResilientHttpClient;
use crate::schemas::{
    DailyCount, EnrichedArticle, NamedCount, SearchRequest, SearchResponse, StatsResponse,
};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a bulk write
#[derive(Debug)]
pub struct BulkSummary {
    pub indexed: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
struct EsSearchResponse {
    took: u64,
    hits: EsHits,
    #[serde(default)]
    aggregations: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    total: EsTotal,
    hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
struct EsTotal {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_source")]
    source: EnrichedArticle,
}

#[derive(Debug, Deserialize)]
struct EsBulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

pub struct SearchStore {
    http: Arc<ResilientHttpClient>,
    base_url: String,
    pattern: String,
    embedding_dimension: usize,
}

impl SearchStore {
    pub fn new(
        http: Arc<ResilientHttpClient>,
        base_url: &str,
        pattern: &str,
        embedding_dimension: usize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            pattern: pattern.to_string(),
            embedding_dimension,
        }
    }

    /// Monthly index name for the given instant: `{pattern}-YYYY-MM`
    pub fn monthly_index(&self, at: DateTime<Utc>) -> String {
        format!("{}-{}", self.pattern, at.format("%Y-%m"))
    }

    /// Short-timeout reachability probe
    pub async fn ping(&self) -> bool {
        let url = format!("{}/", self.base_url);
        let request = self
            .http
            .inner()
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .build();
        match request {
            Ok(req) => match self.http.inner().execute(req).await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Cluster health summary for the health endpoint
    pub async fn cluster_health(&self) -> Result<Value> {
        let url = format!("{}/_cluster/health", self.base_url);
        let request = self
            .http
            .inner()
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .build()
            .map_err(PipelineError::HttpError)?;
        let response = self.http.inner().execute(request).await?;

        if !response.status().is_success() {
            return Err(PipelineError::SearchError(format!(
                "cluster health returned {}",
                response.status()
            )));
        }

        let health: Value = response.json().await?;
        Ok(json!({
            "status": health.get("status").cloned().unwrap_or(json!("unknown")),
            "nodes": health.get("number_of_nodes").cloned().unwrap_or(json!(0)),
        }))
    }

    /// Creates or updates the index template (idempotent)
    pub async fn put_index_template(&self) -> Result<()> {
        let name = format!("{}_template", self.pattern);
        let url = format!("{}/_index_template/{}", self.base_url, name);
        let template = query::index_template(&self.pattern, self.embedding_dimension);

        let request = self
            .http
            .inner()
            .put(&url)
            .json(&template)
            .build()
            .map_err(PipelineError::HttpError)?;
        let response = self.http.execute(request).await?;

        debug!(template = %name, status = %response.status(), "Applied index template");
        info!(template = %name, "Index template created/updated");
        Ok(())
    }

    /// Ensures the index exists, creating it when missing (idempotent)
    pub async fn ensure_index(&self, index: &str) -> Result<()> {
        let url = format!("{}/{}", self.base_url, index);

        let head = self
            .http
            .inner()
            .head(&url)
            .build()
            .map_err(PipelineError::HttpError)?;
        let response = self.http.inner().execute(head).await?;

        if response.status().is_success() {
            return Ok(());
        }

        let put = self
            .http
            .inner()
            .put(&url)
            .build()
            .map_err(PipelineError::HttpError)?;
        let response = self.http.inner().execute(put).await?;

        if response.status().is_success() {
            info!(index = %index, "Created index");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // A concurrent create from another worker replica is fine
            if body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            Err(PipelineError::SearchError(format!(
                "index create failed ({}): {}",
                status, body
            )))
        }
    }

    /// Bulk-writes articles with document id = article id, refreshing the
    /// index so documents are searchable on return
    pub async fn bulk_index(&self, index: &str, articles: &[EnrichedArticle]) -> Result<BulkSummary> {
        if articles.is_empty() {
            return Ok(BulkSummary {
                indexed: 0,
                failed: 0,
            });
        }

        let mut body = String::new();
        for article in articles {
            let action = json!({"index": {"_index": index, "_id": article.id}});
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&serde_json::to_string(article)?);
            body.push('\n');
        }

        let url = format!("{}/_bulk?refresh=true", self.base_url);
        let request = self
            .http
            .inner()
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(body)
            .build()
            .map_err(PipelineError::HttpError)?;
        let response = self.http.inner().execute(request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::SearchError(format!(
                "bulk write failed ({}): {}",
                status, text
            )));
        }

        let parsed: EsBulkResponse = response.json().await?;
        let total = parsed.items.len();
        let failed = if parsed.errors {
            parsed
                .items
                .iter()
                .filter(|item| {
                    item.get("index")
                        .and_then(|i| i.get("error"))
                        .is_some()
                })
                .count()
        } else {
            0
        };

        if failed > 0 {
            warn!(index = %index, failed, total, "Bulk write had item failures");
        }

        Ok(BulkSummary {
            indexed: total - failed,
            failed,
        })
    }

    /// Filtered, paginated search across all monthly indices
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let body = query::search_body(request);
        let parsed = self.run_search(&body).await?;

        Ok(SearchResponse {
            articles: parsed.hits.hits.into_iter().map(|h| h.source).collect(),
            total: parsed.hits.total.value,
            page: request.page,
            size: request.size,
            took: parsed.took,
        })
    }

    /// Term lookup on article id across all monthly indices
    pub async fn get_by_id(&self, id: &str) -> Result<Option<EnrichedArticle>> {
        let body = json!({
            "query": {"term": {"id": id}},
            "size": 1
        });
        let parsed = self.run_search(&body).await?;
        Ok(parsed.hits.hits.into_iter().next().map(|h| h.source))
    }

    /// Latest-N articles, optionally filtered by source and language
    pub async fn latest(
        &self,
        limit: usize,
        source: Option<&str>,
        language: Option<&str>,
    ) -> Result<Vec<EnrichedArticle>> {
        let body = query::latest_body(limit, source, language);
        let parsed = self.run_search(&body).await?;
        Ok(parsed.hits.hits.into_iter().map(|h| h.source).collect())
    }

    /// Aggregate statistics over the whole corpus
    pub async fn stats(&self) -> Result<StatsResponse> {
        let body = query::stats_body();
        let parsed = self.run_search(&body).await?;

        let aggs = parsed
            .aggregations
            .ok_or_else(|| PipelineError::SearchError("missing aggregations".to_string()))?;

        Ok(StatsResponse {
            total_articles: parsed.hits.total.value,
            sources: parse_named_buckets(&aggs, "sources"),
            languages: parse_named_buckets(&aggs, "languages"),
            sentiments: parse_named_buckets(&aggs, "sentiments"),
            daily_counts: parse_daily_buckets(&aggs, 7),
        })
    }

    async fn run_search(&self, body: &Value) -> Result<EsSearchResponse> {
        let url = format!("{}/{}-*/_search", self.base_url, self.pattern);
        let request = self
            .http
            .inner()
            .post(&url)
            .json(body)
            .build()
            .map_err(PipelineError::HttpError)?;
        let response = self.http.execute(request).await?;
        Ok(response.json().await?)
    }
}

fn parse_named_buckets(aggs: &Value, name: &str) -> Vec<NamedCount> {
    aggs.get(name)
        .and_then(|a| a.get("buckets"))
        .and_then(|b| b.as_array())
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|bucket| {
                    Some(NamedCount {
                        name: bucket.get("key")?.as_str()?.to_string(),
                        count: bucket.get("doc_count")?.as_u64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_daily_buckets(aggs: &Value, limit: usize) -> Vec<DailyCount> {
    aggs.get("daily_counts")
        .and_then(|a| a.get("buckets"))
        .and_then(|b| b.as_array())
        .map(|buckets| {
            buckets
                .iter()
                .take(limit)
                .filter_map(|bucket| {
                    Some(DailyCount {
                        date: bucket.get("key_as_string")?.as_str()?.to_string(),
                        count: bucket.get("doc_count")?.as_u64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClientConfig;
    use chrono::TimeZone;

    fn test_store() -> SearchStore {
        let http = Arc::new(ResilientHttpClient::new(HttpClientConfig::default()).unwrap());
        SearchStore::new(http, "http://localhost:9200", "news", 768)
    }

    #[test]
    fn test_monthly_index_name() {
        let store = test_store();
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        assert_eq!(store.monthly_index(at), "news-2025-01");
    }

    #[test]
    fn test_parse_named_buckets() {
        let aggs = json!({
            "sources": {"buckets": [
                {"key": "BBC", "doc_count": 12},
                {"key": "CNN", "doc_count": 7}
            ]}
        });
        let counts = parse_named_buckets(&aggs, "sources");
        assert_eq!(
            counts,
            vec![
                NamedCount { name: "BBC".to_string(), count: 12 },
                NamedCount { name: "CNN".to_string(), count: 7 }
            ]
        );
    }

    #[test]
    fn test_parse_daily_buckets_truncates() {
        let buckets: Vec<Value> = (0..10)
            .map(|i| json!({"key_as_string": format!("2025-01-{:02}", 20 - i), "doc_count": i}))
            .collect();
        let aggs = json!({"daily_counts": {"buckets": buckets}});
        let counts = parse_daily_buckets(&aggs, 7);
        assert_eq!(counts.len(), 7);
        assert_eq!(counts[0].date, "2025-01-20");
    }

    #[test]
    fn test_bulk_body_is_ndjson_shaped() {
        // Covered indirectly through the wiremock integration tests; here we
        // only verify the search response DTO shape parses.
        let json = r#"{
            "took": 4,
            "hits": {"total": {"value": 0, "relation": "eq"}, "hits": []}
        }"#;
        let parsed: EsSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.took, 4);
        assert_eq!(parsed.hits.total.value, 0);
    }
}

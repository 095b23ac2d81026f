//! Query API
//!
//! Read path over the search store: filtered search, article-by-id,
//! latest-N, aggregate statistics, and health. When the search store is
//! unreachable at startup the repository is swapped for a fixed in-memory
//! corpus and health reports mock mode.

pub mod mock;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::bus::MessageBus;
use crate::error::Result;
use crate::schemas::{
    EnrichedArticle, HealthStatus, SearchRequest, SearchResponse, Sentiment, StatsResponse,
};
use crate::search::SearchStore;

pub use mock::MockRepository;

const SERVICE_NAME: &str = "news-aggregator-api";

/// Read-side repository over the indexed corpus.
///
/// Two construction-time variants exist: the search store and the mock
/// corpus. Mock mode is a repository variant, not a global flag.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse>;
    async fn get_article(&self, id: &str) -> Result<Option<EnrichedArticle>>;
    async fn latest(
        &self,
        limit: usize,
        source: Option<&str>,
        language: Option<&str>,
    ) -> Result<Vec<EnrichedArticle>>;
    async fn stats(&self) -> Result<StatsResponse>;
    /// Sub-status of the backing store for the health endpoint
    async fn health(&self) -> serde_json::Value;
    fn mode(&self) -> &'static str;
}

/// Search-store-backed repository
pub struct EsRepository {
    store: SearchStore,
}

impl EsRepository {
    pub fn new(store: SearchStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ArticleRepository for EsRepository {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        self.store.search(&request).await
    }

    async fn get_article(&self, id: &str) -> Result<Option<EnrichedArticle>> {
        self.store.get_by_id(id).await
    }

    async fn latest(
        &self,
        limit: usize,
        source: Option<&str>,
        language: Option<&str>,
    ) -> Result<Vec<EnrichedArticle>> {
        self.store.latest(limit, source, language).await
    }

    async fn stats(&self) -> Result<StatsResponse> {
        self.store.stats().await
    }

    async fn health(&self) -> serde_json::Value {
        match self.store.cluster_health().await {
            Ok(health) => health,
            Err(e) => json!({"status": "unhealthy", "error": e.to_string()}),
        }
    }

    fn mode(&self) -> &'static str {
        "elasticsearch"
    }
}

/// Chooses the repository variant at startup: the search store when it
/// answers a ping, otherwise the mock corpus
pub async fn build_repository(store: SearchStore) -> Arc<dyn ArticleRepository> {
    if store.ping().await {
        info!("Connected to search store");
        Arc::new(EsRepository::new(store))
    } else {
        warn!("Search store unreachable, running in mock mode");
        Arc::new(MockRepository::new())
    }
}

pub struct AppState {
    pub repo: Arc<dyn ArticleRepository>,
    pub bus: Option<Arc<dyn MessageBus>>,
}

/// Error envelope for the HTTP surface
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn not_found(detail: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.to_string(),
        }
    }

    fn bad_request(detail: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail,
        }
    }

    fn internal(detail: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"detail": self.detail}))).into_response()
    }
}

impl From<crate::error::PipelineError> for ApiError {
    fn from(e: crate::error::PipelineError) -> Self {
        error!(error = %e, "Request failed");
        ApiError::internal(e.to_string())
    }
}

/// Raw query parameters for GET /search. List-valued filters are
/// comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub topics: Option<String>,
    pub sources: Option<String>,
    pub languages: Option<String>,
    pub sentiment: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

fn split_list(value: Option<String>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

impl SearchParams {
    fn into_request(self) -> std::result::Result<SearchRequest, ApiError> {
        let sentiment = match self.sentiment {
            Some(raw) => Some(
                raw.parse::<Sentiment>()
                    .map_err(ApiError::bad_request)?,
            ),
            None => None,
        };

        Ok(SearchRequest {
            query: self.query,
            topics: split_list(self.topics),
            sources: split_list(self.sources),
            languages: split_list(self.languages),
            sentiment,
            date_from: self.date_from,
            date_to: self.date_to,
            page: self.page.unwrap_or(1),
            size: self.size.unwrap_or(20),
        }
        .clamped())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestParams {
    pub limit: Option<usize>,
    pub source: Option<String>,
    pub language: Option<String>,
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let es_health = state.repo.health().await;

    let kafka_health = match state.bus {
        Some(ref bus) => {
            if bus.is_healthy().await {
                json!({"status": "healthy"})
            } else {
                json!({"status": "unhealthy"})
            }
        }
        None => json!({"status": "unavailable", "message": "Bus not configured"}),
    };

    // The API is healthy as long as it can serve reads, mock corpus included
    Json(HealthStatus {
        service: SERVICE_NAME.to_string(),
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        details: json!({
            "elasticsearch": es_health,
            "kafka": kafka_health,
            "mode": state.repo.mode(),
        }),
    })
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Json<SearchResponse>, ApiError> {
    let request = params.into_request()?;
    let response = state.repo.search(request).await?;
    info!(
        total = response.total,
        returned = response.articles.len(),
        "Search completed"
    );
    Ok(Json(response))
}

async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> std::result::Result<Json<EnrichedArticle>, ApiError> {
    match state.repo.get_article(&id).await? {
        Some(article) => Ok(Json(article)),
        None => Err(ApiError::not_found("Article not found")),
    }
}

async fn latest_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestParams>,
) -> std::result::Result<Json<Vec<EnrichedArticle>>, ApiError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let articles = state
        .repo
        .latest(limit, params.source.as_deref(), params.language.as_deref())
        .await?;
    Ok(Json(articles))
}

async fn stats(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<StatsResponse>, ApiError> {
    Ok(Json(state.repo.stats().await?))
}

/// Builds the router with permissive CORS
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/search", get(search))
        .route("/articles/latest", get(latest_articles))
        .route("/articles/{id}", get(get_article))
        .route("/stats", get(stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until the shutdown signal fires
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Query API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("Query API shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(Some("a, b ,c".to_string())),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(split_list(Some("  ".to_string())), None);
        assert_eq!(split_list(None), None);
    }

    #[test]
    fn test_search_params_defaults() {
        let params = SearchParams::default();
        let request = params.into_request().unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.size, 20);
        assert!(request.query.is_empty());
    }

    #[test]
    fn test_search_params_clamp_size() {
        let params = SearchParams {
            size: Some(1000),
            page: Some(0),
            ..Default::default()
        };
        let request = params.into_request().unwrap();
        assert_eq!(request.size, 100);
        assert_eq!(request.page, 1);
    }

    #[test]
    fn test_invalid_sentiment_rejected() {
        let params = SearchParams {
            sentiment: Some("bullish".to_string()),
            ..Default::default()
        };
        assert!(params.into_request().is_err());
    }

    #[test]
    fn test_valid_sentiment_parsed() {
        let params = SearchParams {
            sentiment: Some("positive".to_string()),
            ..Default::default()
        };
        let request = params.into_request().unwrap();
        assert_eq!(request.sentiment, Some(Sentiment::Positive));
    }
}

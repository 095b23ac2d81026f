//! Query-surface request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::article::EnrichedArticle;
use super::common::Sentiment;

/// Search request parameters
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub topics: Option<Vec<String>>,
    pub sources: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub sentiment: Option<Sentiment>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: usize,
    pub size: usize,
}

impl SearchRequest {
    /// Clamps pagination into the allowed ranges: page >= 1, size in [1, 100]
    pub fn clamped(mut self) -> Self {
        self.page = self.page.max(1);
        self.size = self.size.clamp(1, 100);
        self
    }

    /// Offset of the first hit for the requested page
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.size
    }
}

/// Search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub articles: Vec<EnrichedArticle>,
    pub total: u64,
    pub page: usize,
    pub size: usize,
    /// Search time in milliseconds
    pub took: u64,
}

/// A named bucket count in the stats response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedCount {
    pub name: String,
    pub count: u64,
}

/// A per-day article count, most recent first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

/// Aggregate statistics over the indexed corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_articles: u64,
    pub sources: Vec<NamedCount>,
    pub languages: Vec<NamedCount>,
    pub sentiments: Vec<NamedCount>,
    pub daily_counts: Vec<DailyCount>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub service: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

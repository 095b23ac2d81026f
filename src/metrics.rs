//! Prometheus metrics for the pipeline stages
//!
//! Metrics include:
//! - articles processed / dropped per stage
//! - latency per stage (histogram)
//! - dedup hits
//! - bus publish latency and outcomes
//! - indexer batch flushes

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramOpts, HistogramVec,
    IntCounterVec, TextEncoder,
};
use tracing::{error, info};

/// Stages of the article pipeline
pub const STAGE_INGEST: &str = "ingest";
pub const STAGE_CLEAN: &str = "clean";
pub const STAGE_NORMALIZE: &str = "normalize";
pub const STAGE_ENRICH: &str = "enrich";
pub const STAGE_INDEX: &str = "index";

static ARTICLES_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsflow_articles_processed_total",
        "Total number of articles processed by each stage",
        &["stage", "source"]
    )
    .expect("Failed to create articles_processed metric")
});

static ARTICLES_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsflow_articles_dropped_total",
        "Total number of articles dropped by each stage, by reason",
        &["stage", "reason"]
    )
    .expect("Failed to create articles_dropped metric")
});

static STAGE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];
    register_histogram_vec!(
        HistogramOpts::new(
            "newsflow_stage_latency_seconds",
            "Latency of each pipeline stage in seconds"
        )
        .buckets(buckets),
        &["stage"]
    )
    .expect("Failed to create stage_latency metric")
});

static ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsflow_errors_total",
        "Total number of errors by stage and type",
        &["stage", "error_type"]
    )
    .expect("Failed to create errors metric")
});

static DEDUP_HITS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsflow_dedup_hits_total",
        "Number of duplicate articles detected",
        &["source"]
    )
    .expect("Failed to create dedup_hits metric")
});

static PUBLISH_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];
    register_histogram_vec!(
        HistogramOpts::new(
            "newsflow_publish_latency_seconds",
            "Latency of publishing to the message bus"
        )
        .buckets(buckets),
        &["bus_type"]
    )
    .expect("Failed to create publish_latency metric")
});

static PUBLISH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsflow_publish_total",
        "Total number of publish operations",
        &["bus_type", "status"]
    )
    .expect("Failed to create publish_total metric")
});

static BATCH_FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsflow_index_batch_flushes_total",
        "Indexer batch flushes by outcome",
        &["status"]
    )
    .expect("Failed to create batch_flushes metric")
});

pub fn record_article_processed(stage: &str, source: &str) {
    ARTICLES_PROCESSED.with_label_values(&[stage, source]).inc();
}

pub fn record_article_dropped(stage: &str, reason: &str) {
    ARTICLES_DROPPED.with_label_values(&[stage, reason]).inc();
}

pub fn record_stage_latency(stage: &str, latency_secs: f64) {
    STAGE_LATENCY.with_label_values(&[stage]).observe(latency_secs);
}

pub fn record_error(stage: &str, error_type: &str) {
    ERRORS.with_label_values(&[stage, error_type]).inc();
}

pub fn record_dedup_hit(source: &str) {
    DEDUP_HITS.with_label_values(&[source]).inc();
}

pub fn record_publish_latency(bus_type: &str, latency_secs: f64) {
    PUBLISH_LATENCY.with_label_values(&[bus_type]).observe(latency_secs);
}

pub fn record_publish_success(bus_type: &str) {
    PUBLISH_TOTAL.with_label_values(&[bus_type, "success"]).inc();
}

pub fn record_publish_failure(bus_type: &str) {
    PUBLISH_TOTAL.with_label_values(&[bus_type, "failure"]).inc();
}

pub fn record_batch_flush(status: &str) {
    BATCH_FLUSHES.with_label_values(&[status]).inc();
}

/// Collects all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

/// A timer for measuring stage latency
pub struct StageTimer {
    stage: &'static str,
    start: std::time::Instant,
}

impl StageTimer {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        record_stage_latency(self.stage, elapsed);
    }
}

// ============================================
// METRICS SERVER
// ============================================

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn handle_metrics(_req: Request<Incoming>) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let metrics = gather_metrics();
    Ok(Response::new(Full::new(Bytes::from(metrics))))
}

/// Starts the metrics HTTP server
pub async fn start_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Metrics server listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_metrics))
                .await
            {
                error!(error = %e, "Metrics connection error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_includes_counters() {
        record_article_processed(STAGE_CLEAN, "example.com");
        record_dedup_hit("example.com");

        let text = gather_metrics();
        assert!(text.contains("newsflow_articles_processed_total"));
        assert!(text.contains("newsflow_dedup_hits_total"));
    }
}

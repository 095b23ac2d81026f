//! Newsflow
//! Streaming news aggregation pipeline
//!
//! Stages:
//! - Ingestor: periodic RSS + headline API fetch, publishes raw articles
//! - Parser/deduper: HTML cleaning and content-hash deduplication
//! - Normalizer: language detection, optional translation, word counts
//! - Enricher: LLM summary/topics/entities/sentiment/embeddings
//! - Indexer: bulk writes into monthly search indices
//! - Query API: filtered search over the indexed corpus
//!
//! Each stage runs as its own long-lived process coupled through bus
//! topics; articles flow strictly forward keyed by id.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use newsflow::bus::{KafkaBus, MessageBus, ResilientPublisher};
use newsflow::config::Config;
use newsflow::dedup::DedupStore;
use newsflow::http::{HttpClientConfig, ResilientHttpClient};
use newsflow::llm::GeminiClient;
use newsflow::search::SearchStore;
use newsflow::translate::Translator;
use newsflow::workers::{EnricherWorker, IndexerWorker, Ingestor, NormalizerWorker, ParserWorker};
use newsflow::{api, metrics, workers};

/// Newsflow - streaming news aggregation pipeline
#[derive(Parser, Debug)]
#[command(name = "newsflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Streaming news aggregation: ingest, dedup, normalize, enrich, index, search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the feed ingestor
    Ingestor,

    /// Run the parser/deduper
    Parser,

    /// Run the normalizer
    Normalizer,

    /// Run the LLM enricher
    Enricher,

    /// Run the search indexer
    Indexer,

    /// Run the query API
    Api,

    /// Create bus topics and the search index template
    Setup,

    /// Show configured capabilities and collaborator health
    Status,
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

/// Handles graceful shutdown on SIGTERM/SIGINT
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    let _ = shutdown_tx.send(());
}

/// Spawns the metrics endpoint when enabled
fn spawn_metrics_server(config: &Config) {
    if !config.metrics_enabled {
        return;
    }
    let addr: SocketAddr = ([0, 0, 0, 0], config.metrics_port).into();
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(addr).await {
            error!(error = %e, "Metrics server failed");
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting newsflow");

    let config = Config::load()?;
    config.validate()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(shutdown_signal(shutdown_tx));

    match cli.command {
        Commands::Ingestor => run_ingestor(config, shutdown_rx).await?,
        Commands::Parser => run_parser(config, shutdown_rx).await?,
        Commands::Normalizer => run_normalizer(config, shutdown_rx).await?,
        Commands::Enricher => run_enricher(config, shutdown_rx).await?,
        Commands::Indexer => run_indexer(config, shutdown_rx).await?,
        Commands::Api => run_api(config, shutdown_rx).await?,
        Commands::Setup => run_setup(config).await?,
        Commands::Status => run_status(config).await?,
    }

    info!("newsflow stopped");
    Ok(())
}

fn connect_bus(config: &Config) -> Result<Arc<KafkaBus>> {
    let bus = KafkaBus::connect(&config.kafka_bootstrap_servers)?;
    Ok(Arc::new(bus))
}

fn search_store(config: &Config) -> Result<SearchStore> {
    let http = Arc::new(ResilientHttpClient::new(HttpClientConfig {
        max_concurrent_requests: config.max_concurrent_requests,
        ..Default::default()
    })?);
    Ok(SearchStore::new(
        http,
        &config.elasticsearch_url(),
        &config.elasticsearch_index_pattern,
        config.embedding_dimension,
    ))
}

async fn run_ingestor(config: Config, shutdown: broadcast::Receiver<()>) -> Result<()> {
    spawn_metrics_server(&config);

    let bus = connect_bus(&config)?;
    let publisher = ResilientPublisher::with_defaults(bus);
    let ingestor = Ingestor::from_config(&config, publisher)?;

    info!(
        feeds = config.feeds().len(),
        newsapi = config.has_newsapi(),
        interval_minutes = config.ingest_interval_minutes,
        "Ingestor initialized"
    );

    ingestor.run(shutdown).await?;
    Ok(())
}

async fn run_parser(config: Config, shutdown: broadcast::Receiver<()>) -> Result<()> {
    spawn_metrics_server(&config);

    let bus = connect_bus(&config)?;
    let consumer = bus
        .subscribe(&[&config.kafka_topic_raw_articles], "parser_deduper_group")
        .await?;

    let dedup = DedupStore::connect(
        config.dedup_cache_size,
        config.dedup_ttl_seconds(),
        &config.redis_url(),
    )
    .await;

    let publisher = ResilientPublisher::with_defaults(bus);
    let worker = ParserWorker::new(dedup, publisher, &config.kafka_topic_cleaned_articles);

    worker.run(consumer, shutdown).await?;
    Ok(())
}

async fn run_normalizer(config: Config, shutdown: broadcast::Receiver<()>) -> Result<()> {
    spawn_metrics_server(&config);

    let bus = connect_bus(&config)?;
    let consumer = bus
        .subscribe(&[&config.kafka_topic_cleaned_articles], "normalizer_group")
        .await?;

    let translator = if config.translation_enabled() {
        config.google_api_key.as_deref().map(Translator::new)
    } else {
        if config.enable_translation {
            warn!("Translation enabled but GOOGLE_API_KEY missing, translation disabled");
        }
        None
    };

    let publisher = ResilientPublisher::with_defaults(bus);
    let worker = NormalizerWorker::new(
        translator,
        &config.target_language,
        publisher,
        &config.kafka_topic_normalized_articles,
    );

    worker.run(consumer, shutdown).await?;
    Ok(())
}

async fn run_enricher(config: Config, shutdown: broadcast::Receiver<()>) -> Result<()> {
    spawn_metrics_server(&config);

    let bus = connect_bus(&config)?;
    let consumer = bus
        .subscribe(&[&config.kafka_topic_normalized_articles], "llm_enricher_group")
        .await?;

    let mode = match config.google_api_key.as_deref() {
        Some(api_key) => workers::enricher::EnricherMode::Model(GeminiClient::new(api_key)),
        None => workers::enricher::EnricherMode::PassThrough,
    };

    let publisher = ResilientPublisher::with_defaults(bus);
    let worker = EnricherWorker::new(
        mode,
        config.embedding_dimension,
        publisher,
        &config.kafka_topic_enriched_articles,
    );

    worker.run(consumer, shutdown).await?;
    Ok(())
}

async fn run_indexer(config: Config, shutdown: broadcast::Receiver<()>) -> Result<()> {
    spawn_metrics_server(&config);

    let bus = connect_bus(&config)?;
    let consumer = bus
        .subscribe(&[&config.kafka_topic_enriched_articles], "indexer_group")
        .await?;

    let store = search_store(&config)?;
    let mut worker = IndexerWorker::new(store, config.es_batch_size);

    worker.run(consumer, shutdown).await?;

    // Consumer offsets were auto-committed; close the producer side of the bus
    bus.close().await?;
    Ok(())
}

async fn run_api(config: Config, shutdown: broadcast::Receiver<()>) -> Result<()> {
    let store = search_store(&config)?;
    let repo = api::build_repository(store).await;

    // The bus is health-reporting only on the read path; its absence is
    // not fatal here
    let bus: Option<Arc<dyn MessageBus>> = match KafkaBus::connect(&config.kafka_bootstrap_servers)
    {
        Ok(bus) => Some(Arc::new(bus)),
        Err(e) => {
            warn!(error = %e, "Bus unavailable for health checks");
            None
        }
    };

    let state = Arc::new(api::AppState { repo, bus });
    let addr: SocketAddr = ([0, 0, 0, 0], config.api_port).into();

    api::serve(addr, state, shutdown).await?;
    Ok(())
}

async fn run_setup(config: Config) -> Result<()> {
    use newsflow::bus::TopicSpec;

    let bus = connect_bus(&config)?;
    bus.ensure_topics(&[
        TopicSpec::new(&config.kafka_topic_raw_articles, 7),
        TopicSpec::new(&config.kafka_topic_cleaned_articles, 7),
        TopicSpec::new(&config.kafka_topic_normalized_articles, 7),
        TopicSpec::new(&config.kafka_topic_enriched_articles, 30),
    ])
    .await?;
    println!("Bus topics created");

    let store = search_store(&config)?;
    store.put_index_template().await?;
    println!("Index template applied");

    let index = store.monthly_index(chrono::Utc::now());
    store.ensure_index(&index).await?;
    println!("Current monthly index ready: {}", index);

    Ok(())
}

async fn run_status(config: Config) -> Result<()> {
    println!("\nNewsflow status");
    println!("================\n");

    println!("Configured capabilities:");
    println!("  - Feeds:        {} configured", config.feeds().len());
    println!(
        "  - Headline API: {}",
        if config.has_newsapi() { "enabled" } else { "disabled (no API key)" }
    );
    println!(
        "  - Translation:  {}",
        if config.translation_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  - Enrichment:   {}",
        if config.has_llm() { "LLM" } else { "pass-through" }
    );

    println!("\nCollaborators:");
    match KafkaBus::connect(&config.kafka_bootstrap_servers) {
        Ok(bus) => {
            let healthy = bus.is_healthy().await;
            println!(
                "  - Bus ({}): {}",
                config.kafka_bootstrap_servers,
                if healthy { "healthy" } else { "unreachable" }
            );
        }
        Err(e) => println!("  - Bus: failed to construct ({})", e),
    }

    let store = search_store(&config)?;
    println!(
        "  - Search store ({}): {}",
        config.elasticsearch_url(),
        if store.ping().await { "healthy" } else { "unreachable" }
    );

    Ok(())
}

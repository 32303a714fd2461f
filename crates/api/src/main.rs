//! Order tracker entry point: read API plus optional Kafka ingestion.

use std::sync::Arc;
use std::time::Duration;

use api::config::{Config, LogFormat};
use api::routes::orders::AppState;
use metrics_exporter_prometheus::PrometheusHandle;
use order_cache::OrderCache;
use order_store::sqlx::postgres::PgPoolOptions;
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use service::OrderService;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(feature = "kafka")]
fn spawn_ingestion<S: OrderStore + 'static>(
    config: &Config,
    service: Arc<OrderService<S>>,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    use ingest::kafka::{KafkaSettings, create_consumer, run_consumer};
    use ingest::{IngestAdapter, RetryPolicy};

    let settings = KafkaSettings {
        brokers: config.kafka_brokers.clone(),
        topic: config.kafka_topic.clone(),
        group_id: config.kafka_group_id.clone(),
    };
    let consumer = match create_consumer(&settings) {
        Ok(consumer) => consumer,
        Err(e) => {
            tracing::error!(error = %e, "failed to start Kafka consumer, ingestion disabled");
            return None;
        }
    };

    let adapter = IngestAdapter::new(service, config.ingest_timeout());
    Some(tokio::spawn(run_consumer(
        consumer,
        adapter,
        RetryPolicy::default(),
        shutdown,
    )))
}

#[cfg(not(feature = "kafka"))]
fn spawn_ingestion<S: OrderStore + 'static>(
    _config: &Config,
    _service: Arc<OrderService<S>>,
    _shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    tracing::warn!("built without the `kafka` feature, ingestion disabled");
    None
}

async fn run<S: OrderStore + 'static>(config: Config, store: S, metrics_handle: PrometheusHandle) {
    let cache = OrderCache::with_capacity(config.cache_capacity);
    let service = Arc::new(OrderService::new(store, cache));

    // Warm before binding so the first requests are served from memory.
    if config.warm_cache {
        match service.restore_cache().await {
            Ok(report) => tracing::info!(
                loaded = report.loaded,
                cached = report.cached,
                "cache warmed"
            ),
            Err(e) => tracing::warn!(error = %e, "cache warm-up failed, starting with empty cache"),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingestion = spawn_ingestion(&config, service.clone(), shutdown_rx);

    let state = Arc::new(AppState {
        service,
        read_timeout: config.read_timeout(),
    });
    let app = api::create_app(state, metrics_handle, &config.static_dir);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .expect("server error");

    if let Some(handle) = ingestion
        && let Err(e) = handle.await
    {
        tracing::error!(error = %e, "ingestion task failed");
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store and run
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .max_lifetime(Duration::from_secs(5 * 60))
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresOrderStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("connected to PostgreSQL");
            run(config, store, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            run(config, InMemoryOrderStore::new(), metrics_handle).await;
        }
    }
}

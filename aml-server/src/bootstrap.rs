//! Wires adapters, workers and routers together for the selected role.

use crate::config::{LoadedConfig, Role};
use crate::server::{build_ingestion_router, build_screening_router, run_server};
use crate::shutdown::{SHUTDOWN_GRACE, drain, shutdown_signal};
use crate::state::AppState;
use aml_core::cache::{FastStore, InMemoryFastStore, RedisFastStore};
use aml_core::config::{BusBackend, FastStoreBackend};
use aml_core::events::{
    ChannelJobPublisher, ChannelJobSource, JobPublisher, JobSource, KafkaJobPublisher,
    KafkaJobSource, job_channel,
};
use aml_core::framework::{DatabaseProcessor, connect_primary_store};
use aml_core::processors::{IngestionService, ScoringWorker};
use aml_core::risk::RiskEngine;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Both halves of the bus as configured. A half is `None` when the role
/// does not need it.
struct Bus {
    publisher: Option<Arc<dyn JobPublisher>>,
    sources: Sources,
}

enum Sources {
    None,
    Kafka(Vec<KafkaJobSource>),
    Channel(Vec<ChannelJobSource>),
}

fn open_bus(config: &LoadedConfig, role: Role) -> anyhow::Result<Bus> {
    let workers = config.server.scoring_workers;
    match config.bus {
        BusBackend::Kafka => {
            let publisher: Option<Arc<dyn JobPublisher>> = if role.runs_ingestion() {
                Some(Arc::new(KafkaJobPublisher::new(&config.kafka)?))
            } else {
                None
            };
            let sources = if role.runs_screening() {
                let sources = (0..workers)
                    .map(|_| KafkaJobSource::new(&config.kafka))
                    .collect::<Result<Vec<_>, _>>()?;
                Sources::Kafka(sources)
            } else {
                Sources::None
            };
            tracing::info!(brokers = ?config.kafka.brokers, topic = %config.kafka.topic, "Kafka bus configured");
            Ok(Bus { publisher, sources })
        }
        BusBackend::Memory => {
            let (publisher, source): (ChannelJobPublisher, ChannelJobSource) = job_channel();
            tracing::warn!("Using the in-process bus; unscreened jobs are lost on restart");
            Ok(Bus {
                publisher: Some(Arc::new(publisher)),
                sources: Sources::Channel(vec![source; workers]),
            })
        }
    }
}

async fn open_fast_store(config: &LoadedConfig) -> anyhow::Result<Arc<dyn FastStore>> {
    let store: Arc<dyn FastStore> = match config.fast_store {
        FastStoreBackend::Redis => {
            tracing::info!(host = %config.redis.host, port = config.redis.port, "Connecting to Redis...");
            Arc::new(RedisFastStore::connect(&config.redis.url()).await?)
        }
        FastStoreBackend::Memory => {
            tracing::warn!("Using the in-memory fast store; counters and blacklists are not shared");
            Arc::new(InMemoryFastStore::new())
        }
    };
    store.seed_blacklists().await?;
    tracing::info!("High-risk country list seeded");
    Ok(store)
}

fn spawn_workers<S: JobSource + 'static>(
    tasks: &mut JoinSet<()>,
    worker: &ScoringWorker,
    sources: Vec<S>,
    shutdown_rx: &watch::Receiver<bool>,
) {
    for source in sources {
        tasks.spawn(worker.clone().run(source, shutdown_rx.clone()));
    }
}

/// Run the selected services until a shutdown signal arrives.
pub async fn run(config: LoadedConfig, role: Role) -> anyhow::Result<()> {
    tracing::info!(path = %config.database.path.display(), "Opening primary store...");
    let pool: SqlitePool = connect_primary_store(&config.database.path).await?;
    tracing::info!("Primary store ready");
    let db = DatabaseProcessor { pool: pool.clone() };

    let bus = open_bus(&config, role)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers: JoinSet<Result<(), std::io::Error>> = JoinSet::new();
    let mut workers: JoinSet<()> = JoinSet::new();

    if role.runs_ingestion() {
        let publisher = bus
            .publisher
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ingestion requires a job publisher"))?;
        let state = AppState::for_ingestion(pool.clone(), IngestionService::new(db.clone(), publisher));
        servers.spawn(run_server(
            "ingestion",
            build_ingestion_router(state),
            config.server.ingestion_listen,
            shutdown_rx.clone(),
        ));
    }

    if role.runs_screening() {
        let fast_store = open_fast_store(&config).await?;
        let worker = ScoringWorker::new(
            db.clone(),
            Arc::new(RiskEngine::new(fast_store.clone())),
            fast_store.clone(),
        );
        match bus.sources {
            Sources::Kafka(sources) => spawn_workers(&mut workers, &worker, sources, &shutdown_rx),
            Sources::Channel(sources) => {
                spawn_workers(&mut workers, &worker, sources, &shutdown_rx)
            }
            Sources::None => {}
        }
        tracing::info!(workers = workers.len(), "Scoring workers started");

        let state = AppState::for_screening(pool.clone(), fast_store);
        servers.spawn(run_server(
            "fraud-detection",
            build_screening_router(state),
            config.server.fraud_detection_listen,
            shutdown_rx.clone(),
        ));
    }
    drop(bus.publisher);

    let early_exit = tokio::select! {
        _ = shutdown_signal() => None,
        Some(result) = servers.join_next() => Some(result),
    };

    let _ = shutdown_tx.send(true);
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    let mut failure: Option<anyhow::Error> = match early_exit {
        Some(Ok(Err(e))) => Some(anyhow::Error::new(e).context("server failed")),
        Some(Err(e)) => Some(anyhow::Error::new(e).context("server task panicked")),
        Some(Ok(Ok(()))) | None => None,
    };

    drain("server", &mut servers, deadline, |result| {
        if let Err(e) = result {
            tracing::error!(error = %e, "Server exited with error");
            failure.get_or_insert_with(|| anyhow::Error::new(e).context("server failed"));
        }
    })
    .await;
    drain("scoring-worker", &mut workers, deadline, |()| {}).await;

    tracing::info!("Closing database connections...");
    pool.close().await;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

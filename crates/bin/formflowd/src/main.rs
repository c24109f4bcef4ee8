//! # formflowd: pipeline trigger-action daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`formflow.toml` + env vars) and initialise logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Connect the configured broker backend and start the consumer tasks
//!   running the pipeline engine
//! - Start the timer scheduler
//! - Build the axum router and serve it
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer. No domain logic belongs here.

mod broker;
mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use formflow_adapter_delivery::{Mailer, ReqwestWebhookClient};
use formflow_adapter_http_axum::state::AppState;
use formflow_adapter_mqtt::{MqttConsumer, MqttProducer};
use formflow_adapter_nats::NatsBus;
use formflow_adapter_storage_sqlite_sqlx::{
    SqliteAccessGrantRepository, SqliteEmailTemplateRepository, SqliteEventRepository,
    SqliteExecutionLog, SqlitePipelineRepository, SqliteTimerStore, SqliteTokenRepository,
};
use formflow_app::broker::InProcessBroker;
use formflow_app::dispatcher::ActionDispatcher;
use formflow_app::engine::PipelineEngine;
use formflow_app::matcher::EventMatcher;
use formflow_app::ports::EventConsumer;
use formflow_app::scheduler::TimerScheduler;
use formflow_app::services::authorization::AuthorizationGuard;
use formflow_app::services::pipeline_service::PipelineService;

use crate::broker::Producer;
use crate::config::{BrokerKind, Config};

type Engine = PipelineEngine<
    Arc<SqlitePipelineRepository>,
    SqliteExecutionLog,
    SqliteEmailTemplateRepository,
    Arc<Mailer>,
    ReqwestWebhookClient,
    Arc<SqliteAccessGrantRepository>,
    Arc<SqliteTimerStore>,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.filter)
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database
    let db = formflow_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let pipeline_repo = Arc::new(SqlitePipelineRepository::new(pool.clone()));
    let grants = Arc::new(SqliteAccessGrantRepository::new(pool.clone()));
    let timers = Arc::new(SqliteTimerStore::new(pool.clone()));

    // Outbound delivery
    let mailer = Arc::new(Mailer::from_config(&config.delivery)?);
    let webhooks = ReqwestWebhookClient::new(config.delivery.webhook_timeout())?;

    // Engine
    let engine: Arc<Engine> = Arc::new(
        PipelineEngine::new(
            EventMatcher::new(Arc::clone(&pipeline_repo)),
            ActionDispatcher::new(
                SqliteExecutionLog::new(pool.clone()).with_lease(config.claim_lease()),
                SqliteEmailTemplateRepository::new(pool.clone()),
                Arc::clone(&mailer),
                webhooks,
                Arc::clone(&grants),
                Arc::clone(&timers),
            ),
        )
        .with_retry_backoff(config.retry_backoff()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = Vec::new();
    let mut drivers = Vec::new();

    // Broker
    let consumers = config.engine.consumers;
    let kind = config.broker_kind()?;
    let producer = match kind {
        BrokerKind::Memory => {
            let broker = InProcessBroker::new();
            for _ in 0..consumers {
                workers.push(spawn_consumer(&engine, broker.consumer(), &shutdown_rx));
            }
            Producer::Memory(broker)
        }
        BrokerKind::Mqtt => {
            let (producer, driver) = MqttProducer::connect(config.broker.mqtt.clone());
            drivers.push(driver);
            for index in 0..consumers {
                let consumer = MqttConsumer::new(&config.broker.mqtt, index);
                workers.push(spawn_consumer(&engine, consumer, &shutdown_rx));
            }
            Producer::Mqtt(producer)
        }
        BrokerKind::Nats => {
            let bus = NatsBus::connect(config.broker.nats.clone()).await?;
            for _ in 0..consumers {
                let consumer = bus.consumer().await?;
                workers.push(spawn_consumer(&engine, consumer, &shutdown_rx));
            }
            Producer::Nats(bus.producer())
        }
    };
    tracing::info!(?kind, consumers, "broker connected");

    // Timers
    let scheduler = TimerScheduler::new(
        Arc::clone(&grants),
        Arc::clone(&timers),
        mailer,
        config.scheduler_settings(),
    );
    let scheduler_shutdown = shutdown_rx.clone();
    workers.push(tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    }));

    // HTTP
    let pipelines = PipelineService::new(
        pipeline_repo,
        AuthorizationGuard::new(SqliteEventRepository::new(pool.clone())),
    );
    let state = AppState::new(pipelines, SqliteTokenRepository::new(pool), producer);
    let app = formflow_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(address = %bind_addr, "formflowd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("stopping background tasks");
    shutdown_tx.send_replace(true);
    for worker in workers {
        if let Err(err) = worker.await {
            tracing::warn!(error = %err, "background task ended abnormally");
        }
    }
    for driver in drivers {
        driver.abort();
    }

    Ok(())
}

fn spawn_consumer<C>(
    engine: &Arc<Engine>,
    consumer: C,
    shutdown: &watch::Receiver<bool>,
) -> JoinHandle<()>
where
    C: EventConsumer + 'static,
{
    let engine = Arc::clone(engine);
    let shutdown = shutdown.clone();
    tokio::spawn(async move { engine.run(consumer, shutdown).await })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

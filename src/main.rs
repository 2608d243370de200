use axum::serve;
use chrono::Utc;
use dotenvy::dotenv;
use shortly::config::{Settings, DEFAULT_LOG_FILTER};
use shortly::dao::{MemoryStore, PgStore, Store};
use shortly::routes::{create_router, AppState};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    _ = dotenv();
    let settings = Settings::from_env().expect("Invalid configuration");
    configure_tracing(&settings.log_filter);
    let store = create_store(&settings).await;
    configure_scheduler(&settings.session_cleanup_cron, store.clone()).await;
    let listener = create_listener(&settings.server_address).await;
    let state = AppState::new(store, settings).expect("Creating application state failed");
    serve(listener, create_router(state))
        .await
        .expect("Server failed to start");
}

fn configure_tracing(log_filter: &str) {
    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|err| {
        eprintln!("Ignoring invalid log filter {log_filter:?}: {err}");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn create_store(settings: &Settings) -> Arc<dyn Store> {
    if settings.uses_memory_store() {
        tracing::warn!("Using in-memory store, data will not survive a restart");
        return Arc::new(MemoryStore::new());
    }
    let db_connection_pool =
        create_db_connection_pool(&settings.database_url, settings.database_max_connections).await;
    sqlx::migrate!("./migrations")
        .run(&db_connection_pool)
        .await
        .expect("Running database migrations failed");
    Arc::new(PgStore::new(db_connection_pool))
}

async fn create_db_connection_pool(database_url: &str, max_connections: u32) -> Pool<Postgres> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .expect("Creating database connection pool failed")
}

async fn configure_scheduler(cron_expression: &str, store: Arc<dyn Store>) {
    let scheduler = JobScheduler::new()
        .await
        .expect("Creating scheduler failed");
    scheduler
        .add(create_session_cleaning_job(cron_expression, store))
        .await
        .expect("Adding session cleaning job to scheduler failed");
    scheduler.start().await.expect("Starting scheduler failed");
}

fn create_session_cleaning_job(cron_expression: &str, store: Arc<dyn Store>) -> Job {
    Job::new_async(cron_expression, move |_, _| {
        let store = store.clone();
        Box::pin(async move {
            match store.delete_expired_sessions(Utc::now()).await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!("Deleted {} expired sessions", deleted),
                Err(err) => tracing::error!("Deleting expired sessions failed: {}", err),
            }
        })
    })
    .expect("Creating session cleaning job failed")
}

async fn create_listener(server_address: &str) -> TcpListener {
    let listener = TcpListener::bind(server_address)
        .await
        .unwrap_or_else(|err| panic!("Binding {server_address} failed: {err}"));
    tracing::info!(address = %server_address, "Accepting connections");
    listener
}

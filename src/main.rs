mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::{Config, StoreBackend};
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use crate::db::{db::DBClient, memory::MemoryStore, SharedStore};
use service::{
    audit_service::AuditService,
    chat_hub::ChatHub,
    chat_service::ChatService,
    job_service::{JobService, LifecyclePolicy},
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub store: SharedStore,
    // Services
    pub job_service: Arc<JobService>,
    pub chat_service: Arc<ChatService>,
}

impl AppState {
    pub fn new(store: SharedStore, config: Config) -> Self {
        let audit_service = Arc::new(AuditService::new(store.clone()));

        let policy = LifecyclePolicy {
            commission_rate: config.commission_rate,
            require_verified_professionals: config.require_verified_professionals,
        };
        let job_service = Arc::new(JobService::new(
            store.clone(),
            audit_service,
            policy,
        ));

        let chat_service = Arc::new(ChatService::new(
            store.clone(),
            job_service.clone(),
            ChatHub::new(),
        ));

        Self {
            env: config,
            store,
            job_service,
            chat_service,
        }
    }
}

async fn connect_store(config: &Config) -> anyhow::Result<SharedStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;

            let pool = PgPoolOptions::new()
                .max_connections(20)
                .min_connections(5)
                .connect(database_url)
                .await
                .context("Failed to connect to the database")?;
            tracing::info!("Connection to the database is successful");

            let db_client = DBClient::new(pool);
            db_client.migrate().await.context("Failed to run migrations")?;

            Ok(Arc::new(db_client))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chambea=debug,tower_http=debug")),
        )
        .init();

    let config = Config::init()?;
    let store = connect_store(&config).await?;

    let allowed_origins = config
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .context("ALLOWED_ORIGINS contains an invalid origin")?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH]);

    let app_state = Arc::new(AppState::new(store, config.clone()));

    let app = create_router(app_state.clone()).layer(cors);

    // Start background jobs
    let app_state_clone = app_state.clone();
    tokio::spawn(async move {
        service::background_jobs::start_job_expiry_job(app_state_clone).await;
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    tracing::info!(
        "Server is running on http://localhost:{} (commission {:.2}%)",
        config.port,
        config.commission_rate.as_fraction() * 100.0
    );

    axum::serve(listener, app).await?;

    Ok(())
}

// src/main.rs

use std::{sync::Arc, time::Duration};

use placement_engine::{
    PlacementService,
    config::Config,
    models::question::QuestionPayload,
    routes,
    state::AppState,
    store::{MemoryStore, PgStore, PlacementStore},
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "placement.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: Arc<dyn PlacementStore> = match &config.database_url {
        Some(url) => Arc::new(connect_postgres(url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let service = PlacementService::new(store, config.placement.clone());

    if let Some(path) = &config.seed_file {
        match seed_questions(&service, path).await {
            Ok(0) => tracing::info!("Question bank already populated, skipping seed"),
            Ok(count) => tracing::info!("Seeded {} questions from {}", count, path),
            Err(e) => tracing::error!("Failed to seed questions from {}: {}", path, e),
        }
    }

    let state = AppState {
        service,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects with retry and applies migrations.
async fn connect_postgres(url: &str) -> Result<PgStore, Box<dyn std::error::Error>> {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(format!("Failed to connect to database after 5 retries: {}", e).into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    Ok(PgStore::new(pool))
}

/// Loads a JSON array of question payloads into an empty bank.
async fn seed_questions(
    service: &PlacementService,
    path: &str,
) -> Result<usize, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let payloads: Vec<QuestionPayload> = serde_json::from_str(&raw)?;
    Ok(service.seed_questions(payloads).await?)
}

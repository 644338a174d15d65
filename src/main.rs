//! Circulation Server
//!
//! REST API server for library loans and fines.

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulation_server::{
    api,
    clock::SystemClock,
    config::AppConfig,
    repository::Repository,
    services::{events::TracingPublisher, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("circulation_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Circulation Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let repository = Repository::new(pool);
    let services = Services::new(
        Arc::new(repository.checkouts.clone()),
        Arc::new(repository.items.clone()),
        Arc::new(SystemClock),
        Arc::new(TracingPublisher),
        config.circulation.policy.clone(),
    )?;

    let sweep_interval = config.circulation.expiry_sweep_interval_secs;
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    if sweep_interval > 0 {
        spawn_digital_expiry(state.clone(), Duration::from_secs(sweep_interval));
    }

    let app = api::create_router(state);

    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically close past-due digital loans
fn spawn_digital_expiry(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match state.services.circulation.expire_digital_loans().await {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!("Expired {} digital loan(s)", expired.len());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Digital expiry sweep failed: {}", e),
            }
        }
    });
}

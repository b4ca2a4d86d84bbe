mod api_doc;
mod config;
mod db;
mod notification;
mod routes;
mod websocket;

use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::notification::service::ScreenRegistry;
use crate::notification::source::{
    FixtureSource, NotificationSource, PgNotificationSource, TimeoutSource,
};

/// Pick the notification source: the hosted database when configured,
/// otherwise the sample list
async fn build_source(
    config: &AppConfig,
) -> Result<Arc<dyn NotificationSource>, Box<dyn std::error::Error>> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set, serving the sample notification list");
        return Ok(Arc::new(TimeoutSource::new(
            FixtureSource::sample(),
            config.fetch_timeout,
        )));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;

    if !db::check_db_initialized(&pool).await {
        db::init_db(&pool).await?;
    }

    info!("Reading notifications from the database");
    Ok(Arc::new(TimeoutSource::new(
        PgNotificationSource::new(pool),
        config.fetch_timeout,
    )))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    tracing_subscriber::fmt::init();

    // Load .env file if it exists
    dotenv().ok();

    let config = AppConfig::from_env()?;
    let source = build_source(&config).await?;
    let registry = Arc::new(ScreenRegistry::new(source));
    ScreenRegistry::spawn_idle_sweep(
        &registry,
        config.screen_idle_ttl,
        config.screen_sweep_interval,
    );
    let app = routes::app(registry);

    let host: std::net::IpAddr = config.host.parse()?;
    let mut port = config.port;
    let max_tries = config.port_attempts.max(1);
    for attempt in 1..=max_tries {
        let addr = SocketAddr::new(host, port);
        match axum::Server::try_bind(&addr) {
            Ok(server) => {
                info!("Server started at http://{}", addr);
                info!("API documentation: http://{}/docs", addr);
                info!("Notification socket: ws://{}/api/notifications/ws", addr);
                return server
                    .serve(app.into_make_service())
                    .await
                    .map_err(|e| e.into());
            }
            Err(e) => {
                warn!("Could not bind {}: {}", addr, e);
                if attempt == max_tries {
                    break;
                }
                port = port.saturating_add(1);
            }
        }
    }

    Err("Failed to bind to any port".into())
}

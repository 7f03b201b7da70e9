use anyhow::Context;
use resale_api::{
    app,
    state::{AppState, AuthConfig, RateLimit},
    worker,
};
use resale_core::{EventBus, Repositories};
use resale_store::{postgres_repositories, Config, DbClient, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resale_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Resale API on port {}", config.server.port);

    // Postgres when configured, in-memory otherwise
    let repos = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            postgres_repositories(db.pool.clone())
        }
        None => {
            tracing::warn!("No database.url configured, using the in-memory store");
            Repositories::in_memory()
        }
    };

    let events = EventBus::new(config.sales.event_buffer);
    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };
    let mut app_state = AppState::new(repos, events.clone(), auth).context("Failed to build metrics registry")?;

    if let Some(url) = &config.redis.url {
        let redis = RedisClient::new(url).await.context("Failed to connect to Redis")?;
        app_state = app_state.with_rate_limit(
            Arc::new(redis),
            RateLimit {
                requests: config.rate_limit.requests,
                window_seconds: config.rate_limit.window_seconds,
            },
        );
    }

    worker::start_metrics_worker(&events, app_state.metrics.clone());

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

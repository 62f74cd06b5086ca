//! Storefront Orders - order placement and stock reconciliation service

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_orders::config::Config;
use storefront_orders::publisher::{DynPublisher, LogPublisher, NatsPublisher};
use storefront_orders::services::Services;
use storefront_orders::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let pool = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await.context("connecting to the database")?;
    let store = PgStore::new(pool);
    if config.run_migrations {
        store.migrate().await.context("running migrations")?;
    }

    let publisher: DynPublisher = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                tracing::info!(%url, "publishing domain events to NATS");
                Arc::new(NatsPublisher::new(client))
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, domain events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let services = Services::new(Arc::new(store), publisher, config.verify_order_totals);
    let app = storefront_orders::api::router(services);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("storefront-orders listening on 0.0.0.0:{}", config.port);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitstudio API Server
//!
//! Session and credential service: registration, password and OTP
//! login, token refresh and password management.

use fitstudio::{
    config::Config,
    db::{MemoryStore, PgStore, RefreshTokenStore, UserStore},
    services::LogOtpSender,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment; refuses to start without a secret
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Fitstudio API");

    let (users, refresh_tokens) = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            stores(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is not persisted)");
            stores(Arc::new(MemoryStore::new()))
        }
    };

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        users,
        refresh_tokens,
        Arc::new(LogOtpSender),
    )?);

    // Periodically drop expired OTP codes and refresh tokens
    spawn_purge_task(state.clone(), config.purge_interval);

    // Build router
    let app = fitstudio::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_purge_task(state: Arc<AppState>, period: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = state.session.purge_expired().await {
                tracing::warn!(error = %e, "Expired credential purge failed");
            }
        }
    });
}

/// Use one store value for both the credential and refresh token stores.
fn stores<S>(store: Arc<S>) -> (Arc<dyn UserStore>, Arc<dyn RefreshTokenStore>)
where
    S: UserStore + RefreshTokenStore + 'static,
{
    (store.clone(), store)
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitstudio=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use fitstudio::config::Config;
use fitstudio::db::{MemoryStore, PgStore};
use fitstudio::routes::create_router;
use fitstudio::services::{OtpPurpose, OtpSender, SessionService};
use fitstudio::AppState;
use std::sync::{Arc, Mutex};

/// Postgres URL for the store integration tests, if one is configured.
#[allow(dead_code)]
pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())
}

/// Skip test with message if no Postgres is configured.
#[macro_export]
macro_rules! require_database {
    () => {
        if crate::common::database_url().is_none() {
            eprintln!("⚠️  Skipping: DATABASE_URL not set");
            return;
        }
    };
}

/// Connect to the configured Postgres and bring the schema up to date.
#[allow(dead_code)]
pub async fn test_pg_store() -> PgStore {
    let url = database_url().expect("DATABASE_URL not set");
    let store = PgStore::connect(&url, 4)
        .await
        .expect("Failed to connect to Postgres");
    store.migrate().await.expect("Failed to run migrations");
    store
}

/// OTP sender that keeps every delivered code for inspection.
#[derive(Default)]
pub struct RecordingOtpSender {
    sent: Mutex<Vec<(String, OtpPurpose, String)>>,
}

#[allow(dead_code)]
impl RecordingOtpSender {
    /// Most recent code delivered to `phone` for `purpose`.
    pub fn last_code(&self, phone: &str, purpose: OtpPurpose) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, kind, _)| p == phone && *kind == purpose)
            .map(|(_, _, code)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl OtpSender for RecordingOtpSender {
    async fn send(&self, phone: &str, code: &str, purpose: OtpPurpose) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), purpose, code.to_string()));
        Ok(())
    }
}

/// Everything a test needs to drive the service and look behind it.
#[allow(dead_code)]
pub struct TestContext {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub sender: Arc<RecordingOtpSender>,
}

#[allow(dead_code)]
impl TestContext {
    pub fn session(&self) -> &SessionService {
        &self.state.session
    }
}

/// Build the application state over an in-memory store.
#[allow(dead_code)]
pub fn test_context() -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(RecordingOtpSender::default());

    let state = Arc::new(
        AppState::new(
            Config::test_default(),
            store.clone(),
            store.clone(),
            sender.clone(),
        )
        .expect("Failed to build test state"),
    );

    TestContext {
        state,
        store,
        sender,
    }
}

/// Create a test app with offline in-memory dependencies.
/// Returns the router and the test context.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, TestContext) {
    let ctx = test_context();
    (create_router(ctx.state.clone()), ctx)
}

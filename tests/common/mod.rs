use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;
use uuid::Uuid;

use cellarstock_api::auth::{AuthConfig, AuthService};
use cellarstock_api::db;
use cellarstock_api::events::EventSender;
use cellarstock_api::services::{HistoryService, WineService};

#[allow(dead_code)]
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub wines: WineService,
    pub history: HistoryService,
    pub auth: AuthService,
}

/// Fresh migrated in-memory database plus wired services. Each call gets an
/// isolated database so tests can run in parallel.
pub async fn setup() -> TestContext {
    let url = format!(
        "sqlite:file:test_{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let pool = Arc::new(db::connect(&url).await.expect("connect to test db"));
    db::run_migrations(&pool).await.expect("run migrations");

    let (tx, mut rx) = mpsc::channel(256);
    // Drain events so senders never block.
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    let event_sender = EventSender::new(tx);

    let auth_config = AuthConfig::new(
        "integration-test-secret-key-0123456789abcdef".to_string(),
        "cellarstock-api".to_string(),
        "cellarstock-clients".to_string(),
        Duration::from_secs(3600),
    );

    TestContext {
        db: pool.clone(),
        wines: WineService::new(pool.clone(), event_sender.clone()),
        history: HistoryService::new(pool.clone(), event_sender.clone()),
        auth: AuthService::new(auth_config, pool, event_sender),
    }
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{EntityTrait, PaginatorTrait};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use cellarstock_api::auth::{AuthConfig, AuthService, DEFAULT_INITIAL_PASSWORD};
use cellarstock_api::entities::user::{Entity as User, UserRole};
use cellarstock_api::events::EventSender;
use cellarstock_api::services::{HistoryService, WineService};
use cellarstock_api::{app_router, config, db, events, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %cfg.environment,
        "starting cellarstock-api"
    );

    let db = Arc::new(db::establish_connection(&cfg).await?);
    if cfg.auto_migrate {
        db::run_migrations(&db).await?;
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = EventSender::new(event_tx);
    tokio::spawn(events::process_events(event_rx));

    let auth_config = AuthConfig::new(
        cfg.jwt_secret.clone(),
        cfg.auth_issuer.clone(),
        cfg.auth_audience.clone(),
        Duration::from_secs(cfg.jwt_expiration),
    );
    let auth_service = Arc::new(AuthService::new(
        auth_config,
        db.clone(),
        event_sender.clone(),
    ));

    bootstrap_admin(&db, &auth_service).await?;

    let state = AppState {
        db: db.clone(),
        config: cfg.clone(),
        event_sender: event_sender.clone(),
        wine_service: WineService::new(db.clone(), event_sender.clone()),
        history_service: HistoryService::new(db.clone(), event_sender),
        auth_service,
    };

    let app = app_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

/// Create the initial administrator account when the user table is empty,
/// so a fresh deployment can be signed into at all.
async fn bootstrap_admin(
    db: &Arc<sea_orm::DatabaseConnection>,
    auth_service: &AuthService,
) -> anyhow::Result<()> {
    let user_count = User::find().count(&**db).await?;
    if user_count > 0 {
        return Ok(());
    }

    let admin = auth_service
        .create_user("admin", Some(DEFAULT_INITIAL_PASSWORD), UserRole::Admin)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bootstrap admin account: {}", e))?;

    warn!(
        username = %admin.username,
        "created initial admin account with the default password; change it immediately"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

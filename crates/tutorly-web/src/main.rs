//! Tutorly Web Server
//!
//! Run with: cargo run -p tutorly-web

use std::sync::Arc;

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tutorly_config::Config;
use tutorly_db::{Database, LinkCodeRepository, TokenRepository};
use tutorly_web::{notify::spawn_engagement_sweep, router::build_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Tutorly Web Server...");

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
        info!("Migrations applied");
    }

    match TokenRepository::new(db.pool().clone()).purge_expired().await {
        Ok(0) => {}
        Ok(n) => info!(purged = n, "removed expired tokens"),
        Err(e) => warn!(error = %e, "could not purge expired tokens"),
    }
    if let Err(e) = LinkCodeRepository::new(db.pool().clone()).purge_expired().await {
        warn!(error = %e, "could not purge expired link codes");
    }

    let bind = config.server.bind.clone();
    let state = Arc::new(AppState::new(db.clone(), config));
    let sweep = spawn_engagement_sweep(state.clone());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweep {
        handle.abort();
    }
    db.close().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

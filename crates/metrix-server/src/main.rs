//! metrix-server: receives metric pushes from agents over HTTP and keeps them
//! in memory with an optional file or SQLite backup.
//!
//! Usage: `metrix-server [config.yaml]` (default `metrix-server.yaml`).

use std::net::SocketAddr;
use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use metrix_core::error::{MetrixError, Result};
use metrix_server::storage::{run_backup_loop, SyncMode};
use metrix_server::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "metrix-server stopped with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "metrix-server.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| MetrixError::BadRequest(format!("server.listen: {e}")))?;
    let restore = cfg.storage.restore;
    let interval = cfg.storage.store_interval();

    let state = AppState::build(cfg).await?;
    let storage = state.storage().clone();

    if restore {
        if let Err(e) = storage.restore_from_backup().await {
            warn!(error = %e, "restore from backup failed, starting empty");
        }
    }

    let cancel = CancellationToken::new();
    let backup_task = (storage.mode() == SyncMode::Asynchronous)
        .then(|| tokio::spawn(run_backup_loop(storage.clone(), interval, cancel.clone())));

    let app = router::build_router(state);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| MetrixError::Internal(format!("bind {listen} failed: {e}")))?;
    info!(%listen, mode = ?storage.mode(), "metrix-server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MetrixError::Internal(format!("server failed: {e}")))?;

    cancel.cancel();
    if let Some(task) = backup_task {
        if let Err(e) = task.await {
            warn!(error = %e, "backup loop task failed");
        }
        storage.create_backup().await?;
        info!("final backup written");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
    info!("signal received, starting graceful shutdown");
}

//! metrix-agent: polls runtime and host metrics and pushes them to a
//! metrix-server.
//!
//! Usage: `metrix-agent [config.yaml]` (default `metrix-agent.yaml`).

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use metrix_agent::{config, Agent, Collector};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "metrix-agent.yaml".into());
    let agent = match config::load_from_file(&path).and_then(|cfg| Agent::new(&cfg, Collector::standard())) {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, config = %path, "metrix-agent failed to start");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let run = tokio::spawn(agent.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();
    if let Err(e) = run.await {
        error!(error = %e, "agent task failed");
        return ExitCode::FAILURE;
    }
    info!("metrix-agent stopped");
    ExitCode::SUCCESS
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
    info!("signal received, stopping agent");
}

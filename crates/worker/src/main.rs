//! `helios-worker` -- render farm worker agent.
//!
//! Registers with the manager, heartbeats, claims render tasks, keeps a
//! local cache of renderer installations, runs renders, and reports
//! results. See [`helios_worker::config::WorkerConfig`] for the
//! environment variables it reads.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use helios_worker::config::WorkerConfig;
use helios_worker::poll::WorkerAgent;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helios_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        manager_url = %config.manager_url,
        worker_name = %config.worker_name,
        cache_dir = %config.cache_dir.display(),
        "Starting helios-worker",
    );

    let cancel = tokio_util::sync::CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let agent = WorkerAgent::new(config);
    if let Err(e) = agent.run(cancel).await {
        tracing::error!(error = %e, "Worker exited with error");
        std::process::exit(1);
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

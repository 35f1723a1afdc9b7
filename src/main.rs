use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use keyscribe::config::Config;
use keyscribe::db::Database;
use keyscribe::storage::ObjectStore;
use keyscribe::workers::{spawn_for_role, Role};
use keyscribe::{routes, AppState};

#[derive(Parser, Debug)]
#[command(name = "keyscribe")]
struct Cli {
    /// Which part of the pipeline this process runs. Defaults to running
    /// everything (HTTP API plus all four worker loops) in one binary,
    /// the right choice for small deployments; pass a single role to run
    /// that stage standalone when scaling one stage independently.
    #[arg(long, value_enum, default_value_t = Role::All)]
    role: Role,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    db.self_heal().await?;
    info!("database connected and schema self-heal complete");

    tokio::fs::create_dir_all(&config.tmp_dir).await?;

    let storage = ObjectStore::from_config(&config).await?;

    let state = Arc::new(AppState {
        db,
        storage,
        config: Arc::new(config.clone()),
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handles = spawn_for_role(state.clone(), cli.role, shutdown_rx);

    if matches!(cli.role, Role::Serve | Role::All) {
        let app = routes::router(state.clone());
        let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
        info!(address = %config.server_address, "listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    // Signal workers to stop, then wait for each to finish its current job
    // and commit. No task is ever aborted mid-transaction.
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        if let Err(e) = handle.await {
            error!(error = %e, "worker task panicked during shutdown");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

pub mod ocr_worker;
pub mod preprocessor;
pub mod reconciler;
pub mod sampler;

use std::sync::Arc;

use tokio::sync::watch;

use crate::AppState;

/// Role a single process instance runs as. `All` runs every worker loop
/// plus the HTTP server in one binary, which is the default for small
/// deployments; the others let an operator scale one stage independently
/// by running several single-role processes against the same database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Sampler,
    Preprocessor,
    Ocr,
    Reconciler,
    Serve,
    All,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Sampler => "sampler",
            Role::Preprocessor => "preprocessor",
            Role::Ocr => "ocr",
            Role::Reconciler => "reconciler",
            Role::Serve => "serve",
            Role::All => "all",
        };
        f.write_str(name)
    }
}

/// Cooperative shutdown signal: workers check this between jobs, never
/// mid-job, so a poll loop always finishes (and commits) whatever it's
/// currently holding before exiting. No task is ever aborted mid-transaction.
pub type ShutdownRx = watch::Receiver<bool>;

/// Sleeps for `interval`, waking early if shutdown is signaled, so an idle
/// worker doesn't sit through a full poll interval before exiting.
pub(crate) async fn wait_or_shutdown(shutdown: &mut ShutdownRx, interval: std::time::Duration) {
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = shutdown.changed() => {}
    }
}

pub fn spawn_for_role(
    state: Arc<AppState>,
    role: Role,
    shutdown: ShutdownRx,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    let run_sampler = matches!(role, Role::Sampler | Role::All);
    let run_preprocessor = matches!(role, Role::Preprocessor | Role::All);
    let run_ocr = matches!(role, Role::Ocr | Role::All);
    let run_reconciler = matches!(role, Role::Reconciler | Role::All);

    if run_sampler {
        let state = state.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { sampler::run(state, shutdown).await }));
    }
    if run_preprocessor {
        let state = state.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { preprocessor::run(state, shutdown).await }));
    }
    if run_ocr {
        let state = state.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { ocr_worker::run(state, shutdown).await }));
    }
    if run_reconciler {
        handles.push(tokio::spawn(async move { reconciler::run(state, shutdown).await }));
    }

    handles
}

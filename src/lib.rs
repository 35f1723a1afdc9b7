pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod ocr;
pub mod routes;
pub mod scene;
pub mod storage;
pub mod workers;

use std::sync::Arc;

use config::Config;
use db::Database;
use storage::ObjectStore;

/// Shared state handed to every route handler and worker loop.
///
/// A single struct rather than one-service-per-field keeps the call
/// sites uniform across the HTTP layer and the four pipeline workers,
/// which all need the same database pool, object store, and config.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub storage: ObjectStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn config_tmp_path(&self, filename: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.config.tmp_dir).join(filename)
    }
}

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

pub mod frames;
pub mod jobs;
pub mod ocr_frames;
pub mod search;
pub mod self_heal;
pub mod videos;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::new_with_pool_config(database_url, 20, 2).await
    }

    pub async fn new_with_pool_config(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the full idempotent self-heal pass: tables, then columns, then
    /// indexes/triggers, then orphan repair. Safe to call on every boot and
    /// from every service/role concurrently (see `self_heal` module docs).
    pub async fn self_heal(&self) -> Result<()> {
        self_heal::run(&self.pool).await
    }
}

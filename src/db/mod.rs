pub mod models;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::{
    config::{Config, StoreBackend},
    store::{MemoryRepository, PgRepository, RecordRepository},
};

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Open the record store selected by `config`, migrating Postgres first.
pub async fn connect(config: &Config) -> Result<Arc<dyn RecordRepository>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            info!("Database ready");
            Ok(Arc::new(PgRepository::new(pool)))
        }
        StoreBackend::Memory => {
            info!("Using in-memory record store; data will not survive a restart");
            Ok(Arc::new(MemoryRepository::new()))
        }
    }
}

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Opens a short-lived Postgres pool for a single operation. Every command
/// and API handler connects, runs its queries, and closes the pool; there is
/// no long-lived connection state.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url())
        .await?;

    Ok(pool)
}

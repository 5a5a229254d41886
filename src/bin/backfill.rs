//! Backfill entry point.
//!
//! No CLI flags: the database comes from `DATABASE_URL` (a `.env` file is
//! honored) and log verbosity from `RUST_LOG`. Both stores share one pool.

use std::sync::Arc;

use miette::IntoDiagnostic;
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pathfill::config::BackfillConfig;
use pathfill::job::BackfillJob;
use pathfill::stores::{SqliteCheckpointStore, SqliteFlowStore};

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BackfillConfig::from_env();
    info!(database_url = %config.database_url, "starting run path backfill");

    let pool = Arc::new(
        SqlitePool::connect(&config.database_url)
            .await
            .into_diagnostic()?,
    );
    let flows = SqliteFlowStore::from_pool(Arc::clone(&pool));
    flows.init_schema().await?;
    let checkpoint = SqliteCheckpointStore::from_pool(Arc::clone(&pool));
    checkpoint.init_schema().await?;

    let report = BackfillJob::new(&flows, &checkpoint)
        .with_batch_size(config.batch_size)
        .run()
        .await?;

    info!(
        runs_total = report.runs_total,
        runs_updated = report.runs_updated,
        paths_trimmed = report.paths_trimmed,
        elapsed_secs = report.elapsed.as_secs(),
        "backfill finished"
    );
    Ok(())
}

//! Environment-resolved configuration for the backfill job.
//!
//! There is deliberately no CLI flag surface: the binary is meant to be
//! invoked by an operator or a migration runner with configuration coming
//! from the environment (a `.env` file is honored via dotenvy).

use crate::job::DEFAULT_BATCH_SIZE;

/// Settings the wiring layer needs to run a backfill.
#[derive(Clone, Debug)]
pub struct BackfillConfig {
    /// Database URL for the record and checkpoint stores.
    pub database_url: String,
    /// Runs fetched per batch.
    pub batch_size: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            database_url: Self::resolve_database_url(None),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BackfillConfig {
    fn resolve_database_url(provided: Option<String>) -> String {
        if let Some(url) = provided {
            return url;
        }
        dotenvy::dotenv().ok();
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://pathfill.db".to_string())
    }

    /// Configuration from the environment (`DATABASE_URL`), with defaults for
    /// anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

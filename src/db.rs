//! SQLite pool for the chunk and score tables.
//!
//! WAL mode lets search and export read while an upload is writing. The
//! pool is sized from [`Config::pool_size`] so every worker job can hold a
//! connection at the same time.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the configured database, creating the file and its directories.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let path = &config.db.path;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let size = config.pool_size();
    let pool = SqlitePoolOptions::new()
        .max_connections(size)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))?;

    tracing::debug!(path = %path.display(), connections = size, "database pool ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_nested_directories_and_sizes_pool() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_db_path(tmp.path().join("a/b/ptx.sqlite"));
        config.db.max_connections = Some(3);

        let pool = connect(&config).await.unwrap();
        assert!(tmp.path().join("a/b/ptx.sqlite").exists());
        assert_eq!(pool.options().get_max_connections(), 3);

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}

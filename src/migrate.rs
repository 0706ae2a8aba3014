//! Database schema migrations. Every statement is idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connect to the configured database and bring its schema up to date.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // `seq` preserves insertion order; `text_folded` is the lowercased text
    // used for case-insensitive containment filters.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            chunk_id TEXT NOT NULL UNIQUE,
            file_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            text TEXT NOT NULL,
            text_folded TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(file_id, ordinal)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scores (
            chunk_id TEXT PRIMARY KEY,
            score INTEGER NOT NULL,
            matches_json TEXT NOT NULL DEFAULT '{}',
            patterns_json TEXT NOT NULL DEFAULT '[]',
            rule_set_version TEXT NOT NULL,
            analyzed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scores_score ON scores(score DESC)")
        .execute(pool)
        .await?;

    Ok(())
}

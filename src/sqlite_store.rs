//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `chunks` and `scores` tables
//! created by [`crate::migrate`]. Batched chunk inserts run in a single
//! transaction, so an upload is either fully stored or not at all.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use parallel_text_core::models::{Chunk, ScoreRecord};
use parallel_text_core::store::{ChunkFilter, Store, TextFilter};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_chunk(row: &SqliteRow) -> Chunk {
    Chunk {
        file_id: row.get("file_id"),
        chunk_id: row.get("chunk_id"),
        ordinal: row.get("ordinal"),
        text: row.get("text"),
        created_at: row.get("created_at"),
    }
}

fn row_to_score(row: &SqliteRow) -> Result<ScoreRecord> {
    let matches_json: String = row.get("matches_json");
    let patterns_json: String = row.get("patterns_json");
    Ok(ScoreRecord {
        chunk_id: row.get("chunk_id"),
        matches: serde_json::from_str(&matches_json)?,
        patterns: serde_json::from_str(&patterns_json)?,
        score: row.get("score"),
        rule_set_version: row.get("rule_set_version"),
        analyzed_at: row.get("analyzed_at"),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let row = sqlx::query(
            "SELECT file_id, chunk_id, ordinal, text, created_at FROM chunks WHERE chunk_id = ?",
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_chunk))
    }

    async fn find_chunks(&self, filter: &ChunkFilter, limit: Option<i64>) -> Result<Vec<Chunk>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT file_id, chunk_id, ordinal, text, created_at FROM chunks WHERE 1 = 1",
        );

        if let Some(file_id) = &filter.file_id {
            qb.push(" AND file_id = ").push_bind(file_id.clone());
        }

        match &filter.text {
            Some(TextFilter::Phrase(needle)) => {
                qb.push(" AND instr(text_folded, ")
                    .push_bind(needle.clone())
                    .push(") > 0");
            }
            Some(TextFilter::AnyToken(tokens)) if tokens.is_empty() => {
                qb.push(" AND 1 = 0");
            }
            Some(TextFilter::AnyToken(tokens)) => {
                qb.push(" AND (");
                let mut sep = qb.separated(" OR ");
                for token in tokens {
                    sep.push("instr(text_folded, ")
                        .push_bind_unseparated(token.clone())
                        .push_unseparated(") > 0");
                }
                qb.push(")");
            }
            None => {}
        }

        qb.push(" ORDER BY seq ASC");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit.max(0));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn find_scores(&self, chunk_ids: &[String]) -> Result<HashMap<String, ScoreRecord>> {
        if chunk_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut out = HashMap::with_capacity(chunk_ids.len());
        // Stay well under SQLite's bound-parameter limit.
        for batch in chunk_ids.chunks(500) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT chunk_id, score, matches_json, patterns_json, rule_set_version, analyzed_at \
                 FROM scores WHERE chunk_id IN (",
            );
            let mut sep = qb.separated(", ");
            for id in batch {
                sep.push_bind(id.clone());
            }
            qb.push(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in &rows {
                let record = row_to_score(row)?;
                out.insert(record.chunk_id.clone(), record);
            }
        }
        Ok(out)
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (chunk_id, file_id, ordinal, text, text_folded, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.file_id)
            .bind(chunk.ordinal)
            .bind(&chunk.text)
            .bind(chunk.text.to_lowercase())
            .bind(chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_score(&self, score: &ScoreRecord) -> Result<()> {
        let matches_json = serde_json::to_string(&score.matches)?;
        let patterns_json = serde_json::to_string(&score.patterns)?;

        sqlx::query(
            r#"
            INSERT INTO scores (chunk_id, score, matches_json, patterns_json, rule_set_version, analyzed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                score = excluded.score,
                matches_json = excluded.matches_json,
                patterns_json = excluded.patterns_json,
                rule_set_version = excluded.rule_set_version,
                analyzed_at = excluded.analyzed_at
            "#,
        )
        .bind(&score.chunk_id)
        .bind(score.score)
        .bind(&matches_json)
        .bind(&patterns_json)
        .bind(&score.rule_set_version)
        .bind(score.analyzed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

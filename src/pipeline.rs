//! Pipeline entry points shared by the CLI and the HTTP server.
//!
//! A [`Pipeline`] owns the store handle, the compiled rule table and the
//! worker pool. CPU-bound steps (extraction, chunking, scoring) run on the
//! pool; store calls run on the async runtime.

use std::sync::Arc;

use serde::Serialize;

use parallel_text_core::aggregate;
use parallel_text_core::chunk::{persist_chunks, prepare_chunks};
use parallel_text_core::models::{Chunk, ScoreRecord, ScoredChunk, SearchHit, UploadReceipt};
use parallel_text_core::rules::RuleSet;
use parallel_text_core::search::{self, SearchRequest};
use parallel_text_core::store::{require_chunk, save_score, ChunkFilter, Store};
use parallel_text_core::{Error, Result};

use crate::config::{Config, SearchConfig};
use crate::db;
use crate::extract;
use crate::migrate;
use crate::sqlite_store::SqliteStore;
use crate::worker::WorkerPool;

/// Outcome of scoring every chunk of one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileAnalysis {
    pub file_id: String,
    pub analyzed: usize,
    pub total_score: i64,
}

#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn Store>,
    rules: Arc<RuleSet>,
    workers: WorkerPool,
    chunk_size: usize,
    search: SearchConfig,
}

impl Pipeline {
    pub fn new(store: Arc<dyn Store>, rules: Arc<RuleSet>, config: &Config) -> Self {
        Self {
            store,
            rules,
            workers: WorkerPool::new(config.workers.max_blocking),
            chunk_size: config.chunking.size,
            search: config.search.clone(),
        }
    }

    /// Open the configured SQLite database, bring its schema up to date,
    /// and compile the rule table.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        let rules = Arc::new(config.rule_set()?);
        Ok(Self::new(Arc::new(SqliteStore::new(pool)), rules, config))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn default_limit(&self) -> i64 {
        self.search.default_limit
    }

    /// Extract, chunk and persist an uploaded document.
    pub async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadReceipt> {
        let name = filename.to_string();
        let text = self
            .workers
            .run(move || extract::extract_text(&bytes, &name))
            .await
            .map_err(Error::Internal)?;

        if text.trim().is_empty() {
            tracing::info!(filename, "upload rejected: no extractable text");
            return Err(Error::NoText);
        }

        let size = self.chunk_size;
        let (file_id, chunks) = self
            .workers
            .run(move || prepare_chunks(&text, size))
            .await
            .map_err(Error::Internal)?;

        let receipt = persist_chunks(self.store(), file_id, chunks).await?;
        tracing::info!(
            filename,
            file_id = %receipt.file_id,
            chunks = receipt.total_chunks,
            "upload stored"
        );
        Ok(receipt)
    }

    /// Score one stored chunk and upsert the result.
    pub async fn analyze(&self, chunk_id: &str) -> Result<ScoreRecord> {
        let chunk = require_chunk(self.store(), chunk_id).await?;
        let rules = self.rules.clone();
        let record = self
            .workers
            .run(move || rules.score_chunk(&chunk))
            .await
            .map_err(Error::Internal)?;
        save_score(self.store(), &record).await?;
        tracing::info!(chunk_id, score = record.score, "chunk analyzed");
        Ok(record)
    }

    /// Score every chunk of `file_id`, in ordinal order.
    pub async fn analyze_file(&self, file_id: &str) -> Result<FileAnalysis> {
        let chunks = self.chunks_of(file_id).await?;
        let rules = self.rules.clone();
        let records = self
            .workers
            .run(move || chunks.iter().map(|c| rules.score_chunk(c)).collect::<Vec<_>>())
            .await
            .map_err(Error::Internal)?;

        let mut total_score = 0;
        for record in &records {
            save_score(self.store(), record).await?;
            total_score += record.score;
        }
        tracing::info!(file_id, analyzed = records.len(), total_score, "file analyzed");
        Ok(FileAnalysis {
            file_id: file_id.to_string(),
            analyzed: records.len(),
            total_score,
        })
    }

    /// Token-overlap search. `limit` falls back to `[search] default_limit`.
    pub async fn search(
        &self,
        query: &str,
        file_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<SearchHit>> {
        let req = SearchRequest {
            query,
            file_id,
            limit: limit.unwrap_or(self.search.default_limit),
            prefilter: self.search.prefilter,
            candidate_k: self.search.candidate_k,
        };
        search::search(self.store(), &req).await
    }

    /// Chunks of `file_id` joined with their scores. Unknown files are
    /// [`Error::NotFound`].
    pub async fn with_scores(&self, file_id: &str) -> Result<Vec<ScoredChunk>> {
        let rows = aggregate::with_scores(self.store(), file_id).await?;
        if rows.is_empty() {
            return Err(Error::not_found(format!("no chunks for file {}", file_id)));
        }
        Ok(rows)
    }

    /// A chunk and its score record, if it has been analyzed.
    pub async fn get(&self, chunk_id: &str) -> Result<(Chunk, Option<ScoreRecord>)> {
        let chunk = require_chunk(self.store(), chunk_id).await?;
        let mut scores = self
            .store
            .find_scores(std::slice::from_ref(&chunk.chunk_id))
            .await
            .map_err(Error::Persistence)?;
        let score = scores.remove(&chunk.chunk_id);
        Ok((chunk, score))
    }

    async fn chunks_of(&self, file_id: &str) -> Result<Vec<Chunk>> {
        if file_id.trim().is_empty() {
            return Err(Error::invalid("file_id must not be empty"));
        }
        let mut chunks = self
            .store
            .find_chunks(&ChunkFilter::for_file(file_id), None)
            .await
            .map_err(Error::Persistence)?;
        if chunks.is_empty() {
            return Err(Error::not_found(format!("no chunks for file {}", file_id)));
        }
        chunks.sort_by_key(|c| c.ordinal);
        Ok(chunks)
    }
}

//! In-memory [`Store`] implementation for testing.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock`. Chunks are kept in
//! insertion order, which is also ordinal order within a document.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{Chunk, ScoreRecord};

use super::{ChunkFilter, Store};

/// In-memory store for tests and embedding in other tools.
pub struct InMemoryStore {
    chunks: RwLock<Vec<Chunk>>,
    scores: RwLock<HashMap<String, ScoreRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
            scores: RwLock::new(HashMap::new()),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        Ok(chunks.iter().find(|c| c.chunk_id == chunk_id).cloned())
    }

    async fn find_chunks(&self, filter: &ChunkFilter, limit: Option<i64>) -> Result<Vec<Chunk>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        let cap = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(chunks
            .iter()
            .filter(|c| filter.file_id.as_deref().map_or(true, |f| c.file_id == f))
            .filter(|c| {
                filter
                    .text
                    .as_ref()
                    .map_or(true, |t| t.matches(&c.text.to_lowercase()))
            })
            .take(cap)
            .cloned()
            .collect())
    }

    async fn find_scores(&self, chunk_ids: &[String]) -> Result<HashMap<String, ScoreRecord>> {
        let scores = self.scores.read().map_err(poisoned)?;
        Ok(chunk_ids
            .iter()
            .filter_map(|id| scores.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        // All-or-nothing: reject the whole batch on any duplicate ID.
        for c in chunks {
            if stored.iter().any(|s| s.chunk_id == c.chunk_id) {
                bail!("duplicate chunk_id: {}", c.chunk_id);
            }
        }
        stored.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn upsert_score(&self, score: &ScoreRecord) -> Result<()> {
        let mut scores = self.scores.write().map_err(poisoned)?;
        scores.insert(score.chunk_id.clone(), score.clone());
        Ok(())
    }
}

//! Storage abstraction for Parallel Text.
//!
//! The [`Store`] trait defines the record operations the pipeline needs,
//! enabling pluggable backends (SQLite in the application crate,
//! [`memory::InMemoryStore`] for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Consistency is delegated entirely to the backend: the pipeline performs
//! no locking of its own and assumes atomic single-record upsert and
//! batched insert.

pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ScoreRecord};

/// Full-text condition applied to chunk text during candidate selection.
///
/// Needles are expected to be lowercased already; backends compare them
/// against the lowercased chunk text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextFilter {
    /// Text contains the whole string.
    Phrase(String),
    /// Text contains at least one of the strings.
    AnyToken(Vec<String>),
}

impl TextFilter {
    /// Returns `true` if `folded_text` (already lowercased) satisfies the filter.
    pub fn matches(&self, folded_text: &str) -> bool {
        match self {
            TextFilter::Phrase(needle) => folded_text.contains(needle.as_str()),
            TextFilter::AnyToken(tokens) => tokens.iter().any(|t| folded_text.contains(t.as_str())),
        }
    }
}

/// Selection criteria for [`Store::find_chunks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFilter {
    pub file_id: Option<String>,
    pub text: Option<TextFilter>,
}

impl ChunkFilter {
    pub fn for_file(file_id: &str) -> Self {
        Self {
            file_id: Some(file_id.to_string()),
            text: None,
        }
    }
}

/// Abstract storage backend for chunks and score records.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_chunk`](Store::get_chunk) | Fetch one chunk by ID |
/// | [`find_chunks`](Store::find_chunks) | Filtered chunk listing in insertion order |
/// | [`find_scores`](Store::find_scores) | Bulk score lookup by chunk ID |
/// | [`insert_chunks`](Store::insert_chunks) | Batched insert of a document's chunks |
/// | [`upsert_score`](Store::upsert_score) | Insert or overwrite a chunk's score |
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>>;

    /// Chunks matching `filter`, ordered by upload then ordinal, capped at
    /// `limit` when given.
    async fn find_chunks(&self, filter: &ChunkFilter, limit: Option<i64>) -> Result<Vec<Chunk>>;

    /// Score records for the given chunk IDs. IDs without a record are
    /// simply absent from the map.
    async fn find_scores(&self, chunk_ids: &[String]) -> Result<HashMap<String, ScoreRecord>>;

    /// Insert all chunks of one document in a single batch.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Insert or replace the score for `score.chunk_id`.
    async fn upsert_score(&self, score: &ScoreRecord) -> Result<()>;
}

/// Fetch a chunk, mapping absence to [`Error::NotFound`](crate::Error::NotFound).
pub async fn require_chunk<S: Store + ?Sized>(store: &S, chunk_id: &str) -> crate::Result<Chunk> {
    if chunk_id.trim().is_empty() {
        return Err(crate::Error::invalid("chunk_id must not be empty"));
    }
    store
        .get_chunk(chunk_id)
        .await
        .map_err(crate::Error::Persistence)?
        .ok_or_else(|| crate::Error::not_found(format!("chunk {}", chunk_id)))
}

/// Persist a score record, overwriting any previous one for the chunk.
pub async fn save_score<S: Store + ?Sized>(store: &S, score: &ScoreRecord) -> crate::Result<()> {
    store
        .upsert_score(score)
        .await
        .map_err(crate::Error::Persistence)
}

//! Fixed-size text chunker.
//!
//! Splits extracted document text into consecutive, non-overlapping
//! [`Chunk`]s of exactly `size` characters, except possibly the last one.
//! Splitting counts Unicode scalar values and ignores word boundaries, so
//! a chunk may end mid-word.
//!
//! Each upload receives a fresh random `file_id`; chunk IDs are derived
//! from it and the 1-based ordinal, so they are reproducible and unique
//! within a document.
//!
//! # Example
//!
//! ```rust
//! use parallel_text_core::chunk::split_text;
//!
//! let pieces = split_text("abcdefghij", 4);
//! assert_eq!(pieces, vec!["abcd", "efgh", "ij"]);
//! ```

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Chunk, UploadReceipt};
use crate::store::Store;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Split `text` into pieces of `size` characters.
///
/// Returns `ceil(len / size)` pieces (none for empty text). Concatenating
/// them in order reproduces `text` exactly. A `size` of 0 is treated as 1.
pub fn split_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            pieces.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

/// Generate a fresh upload identifier.
pub fn new_file_id() -> String {
    Uuid::new_v4().to_string()
}

/// `<file_id>_chunk_<ordinal>`.
pub fn chunk_id(file_id: &str, ordinal: i64) -> String {
    format!("{}_chunk_{}", file_id, ordinal)
}

/// Assign identifiers to split pieces, ordinals starting at 1.
pub fn build_chunks(file_id: &str, pieces: Vec<String>) -> Vec<Chunk> {
    let now = chrono::Utc::now().timestamp();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let ordinal = i as i64 + 1;
            Chunk {
                file_id: file_id.to_string(),
                chunk_id: chunk_id(file_id, ordinal),
                ordinal,
                text,
                created_at: now,
            }
        })
        .collect()
}

/// Split `text` and build the chunk records for a new upload.
///
/// This is the CPU-bound half of ingestion and holds no store reference,
/// so it can run on a blocking worker.
pub fn prepare_chunks(text: &str, size: usize) -> (String, Vec<Chunk>) {
    let file_id = new_file_id();
    let chunks = build_chunks(&file_id, split_text(text, size));
    (file_id, chunks)
}

/// Persist prepared chunks with one batched write.
pub async fn persist_chunks<S: Store + ?Sized>(
    store: &S,
    file_id: String,
    chunks: Vec<Chunk>,
) -> Result<UploadReceipt> {
    if !chunks.is_empty() {
        store
            .insert_chunks(&chunks)
            .await
            .map_err(Error::Persistence)?;
    }
    tracing::info!(file_id = %file_id, chunks = chunks.len(), "chunks persisted");
    Ok(UploadReceipt {
        total_chunks: chunks.len(),
        chunk_ids: chunks.into_iter().map(|c| c.chunk_id).collect(),
        file_id,
    })
}

/// Split `text` into chunks under a new `file_id` and store them.
///
/// Whitespace-only text is rejected with [`Error::NoText`] before any
/// store access.
pub async fn split_and_persist<S: Store + ?Sized>(
    store: &S,
    text: &str,
    size: usize,
) -> Result<UploadReceipt> {
    if text.trim().is_empty() {
        return Err(Error::NoText);
    }
    let (file_id, chunks) = prepare_chunks(text, size);
    persist_chunks(store, file_id, chunks).await
}

//! Core data models used throughout Parallel Text.
//!
//! These types are the record shapes exchanged between the pipeline
//! components and the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Distinct matched tokens per rule name.
pub type RuleMatches = BTreeMap<String, Vec<String>>;

/// A fixed-size slice of an uploaded document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier shared by every chunk of one upload.
    pub file_id: String,
    /// `<file_id>_chunk_<ordinal>`.
    pub chunk_id: String,
    /// 1-based position within the document.
    pub ordinal: i64,
    pub text: String,
    /// Unix seconds at which the chunk was created.
    pub created_at: i64,
}

/// Persisted result of running the rule engine over one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub chunk_id: String,
    pub matches: RuleMatches,
    pub patterns: Vec<String>,
    pub score: i64,
    /// Fingerprint of the rule table that produced this record.
    pub rule_set_version: String,
    pub analyzed_at: i64,
}

/// Summary of a completed upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub file_id: String,
    pub total_chunks: usize,
    pub chunk_ids: Vec<String>,
}

/// A chunk left-joined with its score, as consumed by export and mail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub text: String,
    pub score: i64,
    pub matches: RuleMatches,
    pub patterns: Vec<String>,
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f64,
    pub text: String,
}

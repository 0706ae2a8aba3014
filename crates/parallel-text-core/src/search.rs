//! Token-overlap search over stored chunks.
//!
//! The algorithm operates entirely through the [`Store`] trait. The caller
//! supplies the query, an optional file scope, and a result limit.
//!
//! # Ranking
//!
//! 1. Lowercase the query and split it on whitespace into tokens.
//! 2. Ask the store for candidates: chunks in scope whose lowercased text
//!    passes the prefilter (whole query by default, see [`Prefilter`]).
//! 3. Score each candidate as `distinct tokens found / total tokens`.
//! 4. Stable sort by score, descending. Ties keep store order.
//! 5. Truncate to the limit, clamped to `[1, 200]`.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{Chunk, SearchHit};
use crate::store::{ChunkFilter, Store, TextFilter};

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 200;

/// Candidate selection strategy applied before ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prefilter {
    /// Chunk text must contain the whole lowercased query.
    #[default]
    Phrase,
    /// Chunk text must contain at least one query token.
    AnyToken,
}

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    /// Restrict results to one upload.
    pub file_id: Option<&'a str>,
    /// Requested result count; clamped, never rejected.
    pub limit: i64,
    pub prefilter: Prefilter,
    /// Maximum candidates fetched from the store before ranking.
    pub candidate_k: i64,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a str, limit: i64) -> Self {
        Self {
            query,
            file_id: None,
            limit,
            prefilter: Prefilter::Phrase,
            candidate_k: 1000,
        }
    }
}

/// Clamp a caller-supplied limit into `[MIN_LIMIT, MAX_LIMIT]`.
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(MIN_LIMIT, MAX_LIMIT)
}

/// Lowercase and split on whitespace.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Fraction of distinct `tokens` that occur in `folded_text`.
///
/// The denominator is the total token count, including repeats.
pub fn overlap_score(tokens: &[String], folded_text: &str) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let found = distinct.iter().filter(|t| folded_text.contains(*t)).count();
    found as f64 / tokens.len() as f64
}

/// Score and order candidates for `query`.
pub fn rank_candidates(query: &str, candidates: Vec<Chunk>) -> Vec<SearchHit> {
    let tokens = tokenize(query);
    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .map(|c| SearchHit {
            score: overlap_score(&tokens, &c.text.to_lowercase()),
            chunk_id: c.chunk_id,
            text: c.text,
        })
        .collect();
    // sort_by is stable, so equal scores keep candidate order.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits
}

/// Run a token-overlap search against a [`Store`] backend.
///
/// An empty or whitespace-only query is rejected with
/// [`Error::InvalidInput`] before the store is touched.
pub async fn search<S: Store + ?Sized>(store: &S, req: &SearchRequest<'_>) -> Result<Vec<SearchHit>> {
    let folded = req.query.trim().to_lowercase();
    if folded.is_empty() {
        return Err(Error::invalid("query must not be empty"));
    }
    let limit = clamp_limit(req.limit);

    let text = match req.prefilter {
        Prefilter::Phrase => TextFilter::Phrase(folded.clone()),
        Prefilter::AnyToken => TextFilter::AnyToken(tokenize(&folded)),
    };
    let filter = ChunkFilter {
        file_id: req.file_id.map(str::to_string),
        text: Some(text),
    };

    let candidates = store
        .find_chunks(&filter, Some(req.candidate_k.max(limit)))
        .await
        .map_err(Error::Persistence)?;
    tracing::debug!(query = %folded, candidates = candidates.len(), "search candidates");

    let mut hits = rank_candidates(&folded, candidates);
    hits.truncate(limit as usize);
    Ok(hits)
}

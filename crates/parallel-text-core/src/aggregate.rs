//! Chunk/score join for export and summaries.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::ScoredChunk;
use crate::store::{ChunkFilter, Store};

/// Every chunk of `file_id`, in ordinal order, left-joined with its score.
///
/// Chunks that were never analyzed appear with `score = 0` and empty
/// matches and patterns.
pub async fn with_scores<S: Store + ?Sized>(store: &S, file_id: &str) -> Result<Vec<ScoredChunk>> {
    if file_id.trim().is_empty() {
        return Err(Error::invalid("file_id must not be empty"));
    }
    let mut chunks = store
        .find_chunks(&ChunkFilter::for_file(file_id), None)
        .await
        .map_err(Error::Persistence)?;
    chunks.sort_by_key(|c| c.ordinal);

    let ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
    let mut scores = store.find_scores(&ids).await.map_err(Error::Persistence)?;

    Ok(chunks
        .into_iter()
        .map(|c| match scores.remove(&c.chunk_id) {
            Some(s) => ScoredChunk {
                chunk_id: c.chunk_id,
                text: c.text,
                score: s.score,
                matches: s.matches,
                patterns: s.patterns,
            },
            None => ScoredChunk {
                chunk_id: c.chunk_id,
                text: c.text,
                score: 0,
                matches: Default::default(),
                patterns: Vec::new(),
            },
        })
        .collect())
}

/// Headline numbers for a file, as sent in the summary mail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub file_id: String,
    pub total_chunks: usize,
    pub average_score: f64,
    /// Rows with at least one non-empty rule match list.
    ///
    /// An analyzed chunk whose lists are all empty does not count, and
    /// neither does an unanalyzed one. This is not "chunks analyzed": a
    /// file scored end to end with no hits reports zero here.
    pub chunks_with_matches: usize,
}

pub fn summarize(file_id: &str, rows: &[ScoredChunk]) -> Summary {
    let total = rows.len();
    let average_score = if total == 0 {
        0.0
    } else {
        rows.iter().map(|r| r.score as f64).sum::<f64>() / total as f64
    };
    let chunks_with_matches = rows
        .iter()
        .filter(|r| r.matches.values().any(|m| !m.is_empty()))
        .count();
    Summary {
        file_id: file_id.to_string(),
        total_chunks: total,
        average_score,
        chunks_with_matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split_and_persist;
    use crate::rules::RuleSet;
    use crate::store::memory::InMemoryStore;
    use crate::store::{require_chunk, save_score};

    #[tokio::test]
    async fn test_join_includes_unscored_chunks() {
        let store = InMemoryStore::new();
        let text = format!("{}{}", "urgent ".repeat(2), "z".repeat(20));
        let receipt = split_and_persist(&store, &text, 10).await.unwrap();
        assert_eq!(receipt.total_chunks, 4);

        let rules = RuleSet::builtin();
        let first = require_chunk(&store, &receipt.chunk_ids[0]).await.unwrap();
        save_score(&store, &rules.score_chunk(&first)).await.unwrap();

        let rows = with_scores(&store, &receipt.file_id).await.unwrap();
        assert_eq!(rows.len(), receipt.total_chunks);
        assert_eq!(rows[0].chunk_id, receipt.chunk_ids[0]);
        assert_eq!(rows[0].score, 4);
        assert_eq!(rows[0].patterns, vec!["urgent"]);
        for row in &rows[1..] {
            assert_eq!(row.score, 0);
            assert!(row.matches.is_empty());
            assert!(row.patterns.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_file_is_empty() {
        let store = InMemoryStore::new();
        assert!(with_scores(&store, "missing").await.unwrap().is_empty());
        assert!(matches!(
            with_scores(&store, " ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_summarize() {
        let rules = RuleSet::builtin();
        let hit = rules.analyze("urgent");
        let rows = vec![
            ScoredChunk {
                chunk_id: "a".into(),
                text: "urgent".into(),
                score: hit.score,
                matches: hit.matches,
                patterns: hit.flat_patterns,
            },
            ScoredChunk {
                chunk_id: "b".into(),
                text: "x".into(),
                score: 0,
                matches: rules.analyze("x").matches,
                patterns: Vec::new(),
            },
        ];
        let s = summarize("f", &rows);
        assert_eq!(s.total_chunks, 2);
        assert!((s.average_score - 2.0).abs() < 1e-9);
        assert_eq!(s.chunks_with_matches, 1);

        assert_eq!(summarize("f", &[]).average_score, 0.0);
    }
}

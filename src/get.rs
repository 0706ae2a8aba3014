//! Chunk retrieval by ID.
//!
//! Fetches a chunk and its score record (if analyzed). Used by the
//! `ptx get` CLI command.

use anyhow::Result;
use serde::Serialize;

use parallel_text_core::models::RuleMatches;

use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResponse {
    pub chunk_id: String,
    pub file_id: String,
    pub ordinal: i64,
    pub created_at: String, // ISO8601
    pub text: String,
    pub score: Option<ScoreResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResponse {
    pub score: i64,
    pub matches: RuleMatches,
    pub patterns: Vec<String>,
    pub rule_set_version: String,
    pub analyzed_at: String, // ISO8601
}

pub async fn get_chunk(pipeline: &Pipeline, chunk_id: &str) -> Result<ChunkResponse> {
    let (chunk, score) = pipeline.get(chunk_id).await?;
    Ok(ChunkResponse {
        chunk_id: chunk.chunk_id,
        file_id: chunk.file_id,
        ordinal: chunk.ordinal,
        created_at: format_ts_iso(chunk.created_at),
        text: chunk.text,
        score: score.map(|s| ScoreResponse {
            score: s.score,
            matches: s.matches,
            patterns: s.patterns,
            rule_set_version: s.rule_set_version,
            analyzed_at: format_ts_iso(s.analyzed_at),
        }),
    })
}

/// CLI entry point: prints the chunk and its score to stdout.
pub async fn run_get(pipeline: &Pipeline, chunk_id: &str) -> Result<()> {
    let chunk = get_chunk(pipeline, chunk_id).await?;

    println!("--- Chunk ---");
    println!("chunk_id:     {}", chunk.chunk_id);
    println!("file_id:      {}", chunk.file_id);
    println!("ordinal:      {}", chunk.ordinal);
    println!("created_at:   {}", chunk.created_at);
    println!();

    println!("--- Text ---");
    println!("{}", chunk.text);
    println!();

    match &chunk.score {
        Some(s) => {
            println!("--- Score ---");
            println!("score:        {}", s.score);
            println!("patterns:     {}", s.patterns.join(", "));
            println!("rule_set:     {}", s.rule_set_version);
            println!("analyzed_at:  {}", s.analyzed_at);
            for (rule, found) in s.matches.iter().filter(|(_, m)| !m.is_empty()) {
                println!("  {:<12} {}", rule, found.join(", "));
            }
        }
        None => println!("(not analyzed)"),
    }

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(format_ts_iso(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_ts_iso(1_700_000_000), "2023-11-14T22:13:20Z");
    }
}

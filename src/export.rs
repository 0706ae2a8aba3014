//! CSV export of a file's chunks joined with their scores.
//!
//! Columns are `chunk_id,text,score,matches,patterns`. The `matches` cell
//! is a JSON object keyed by rule name (sorted), `patterns` a JSON array.
//! Used by `ptx export`, `GET /export`, and the summary mail attachment.

use anyhow::{Context, Result};
use std::path::Path;

use parallel_text_core::models::ScoredChunk;

use crate::pipeline::Pipeline;

pub const CSV_HEADER: [&str; 5] = ["chunk_id", "text", "score", "matches", "patterns"];

/// Attachment/download name for a file's export.
pub fn export_filename(file_id: &str) -> String {
    format!("{}_chunks.csv", file_id)
}

/// Render rows as RFC 4180 CSV.
pub fn render_csv(rows: &[ScoredChunk]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for row in rows {
        let matches = serde_json::to_string(&row.matches)?;
        let patterns = serde_json::to_string(&row.patterns)?;
        let score = row.score.to_string();
        writer.write_record([
            row.chunk_id.as_str(),
            row.text.as_str(),
            score.as_str(),
            matches.as_str(),
            patterns.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().context("failed to flush CSV writer")?;
    Ok(String::from_utf8(bytes)?)
}

/// Export a file as CSV.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(pipeline: &Pipeline, file_id: &str, output: Option<&Path>) -> Result<()> {
    let rows = pipeline.with_scores(file_id).await?;
    let csv = render_csv(&rows)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &csv)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(file_id, rows = rows.len(), path = %path.display(), "export written");
        }
        None => {
            print!("{}", csv);
        }
    }

    Ok(())
}

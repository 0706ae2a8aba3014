//! `ptx search` output.
//!
//! Ranking lives in [`parallel_text_core::search`]; this module only
//! formats hits for the terminal.

use anyhow::Result;

use crate::pipeline::Pipeline;

const PREVIEW_CHARS: usize = 160;

pub async fn run_search(
    pipeline: &Pipeline,
    query: &str,
    file_id: Option<&str>,
    limit: Option<i64>,
) -> Result<()> {
    let hits = pipeline.search(query, file_id, limit).await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, hit.score, hit.chunk_id);
        println!("    {}", preview(&hit.text));
        println!();
    }
    Ok(())
}

/// One-line preview: whitespace collapsed, cut at [`PREVIEW_CHARS`].
fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_cuts() {
        assert_eq!(preview("a\n\nb   c"), "a b c");
        let long = "x".repeat(200);
        assert_eq!(preview(&long).len(), PREVIEW_CHARS + 3);
    }
}

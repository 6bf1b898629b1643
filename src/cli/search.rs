use anyhow::{Context, Result};
use std::fmt::Write as _;

use mnemo::config::MnemoConfig;
use mnemo::db;
use mnemo::memory::search::{self, SearchOptions};
use mnemo::memory::types::SearchResult;

const PREVIEW_CHARS: usize = 500;

/// Flags for a terminal search.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub limit: Option<usize>,
    pub min_score: Option<f64>,
    pub keyword_only: bool,
    pub verbose: bool,
    pub json: bool,
}

/// Run a search from the terminal.
pub async fn search(config: &MnemoConfig, query: &str, args: SearchArgs) -> Result<()> {
    let conn = db::open_existing(config.resolved_db_path())?;
    let provider = super::provider(config);

    let mut options = SearchOptions::from_config(&config.retrieval);
    if let Some(limit) = args.limit {
        options.limit = limit;
    }
    if let Some(min_score) = args.min_score {
        options.min_score = min_score;
    }
    options.keyword_only = args.keyword_only;

    let retrieval = config.retrieval.clone();
    let query_text = query.to_string();
    let results = tokio::task::spawn_blocking(move || {
        search::search(&conn, provider.as_ref(), &query_text, &options, &retrieval)
    })
    .await
    .context("search task panicked")??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    print!("{}", format_results(&results, args.verbose));
    Ok(())
}

/// Markdown-ish listing, one block per result.
fn format_results(results: &[SearchResult], verbose: bool) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        let _ = writeln!(out, "## Result {} (score: {:.2})", i + 1, result.score);
        let _ = writeln!(
            out,
            "**File:** {}:{}-{}",
            result.file_path, result.line_start, result.line_end
        );
        if verbose {
            let _ = writeln!(
                out,
                "**Scores:** vector={:.3}, text={:.3}",
                result.vector_score, result.text_score
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", preview(&result.content));
        let _ = writeln!(out);
        let _ = writeln!(out, "---");
        let _ = writeln!(out);
    }
    out
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(content: &str) -> SearchResult {
        SearchResult {
            chunk_id: 1,
            file_path: "memory/2026-01-01.md".into(),
            line_start: 3,
            line_end: 9,
            content: content.into(),
            score: 0.8123,
            vector_score: 0.9,
            text_score: 0.6,
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(PREVIEW_CHARS + 10);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn listing_shows_location_and_optional_scores() {
        let text = format_results(&[result("deploy notes")], false);
        assert!(text.contains("## Result 1 (score: 0.81)"));
        assert!(text.contains("**File:** memory/2026-01-01.md:3-9"));
        assert!(!text.contains("**Scores:**"));

        let text = format_results(&[result("deploy notes")], true);
        assert!(text.contains("**Scores:** vector=0.900, text=0.600"));
    }
}

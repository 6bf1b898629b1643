use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use mnemo::config::MnemoConfig;
use mnemo::db;
use mnemo::memory::stats;

const RECENT_FILES: usize = 10;

/// Print provider reachability, index statistics, and memory file status.
pub async fn status(config: &MnemoConfig) -> Result<()> {
    println!("mnemo status");
    println!("{}", "=".repeat(40));
    println!("Root:               {}", config.root().display());

    // Embedding provider
    let provider = super::provider(config);
    let probe = tokio::task::spawn_blocking(move || provider.embed("status probe"))
        .await
        .context("probe task panicked")?;
    match probe {
        Ok(vector) => println!(
            "Embedding:          {} / {} OK ({} dims)",
            config.embedding.provider,
            config.embedding.model,
            vector.len()
        ),
        Err(e) => println!(
            "Embedding:          {} / {} UNREACHABLE ({e})",
            config.embedding.provider, config.embedding.model
        ),
    }
    println!("Endpoint:           {}", config.embedding.base_url);

    // Index store
    let db_path = config.resolved_db_path();
    println!();
    println!("Database:           {}", db_path.display());
    match db::open_existing(&db_path) {
        Ok(conn) => {
            let stats = stats::index_stats(&conn, Some(&db_path), RECENT_FILES)?;
            println!("Size:               {}", super::format_bytes(stats.db_size_bytes));
            println!("Schema version:     {}", stats.schema_version);
            println!("Files indexed:      {}", stats.total_files);
            println!("Chunks:             {}", stats.total_chunks);
            println!("Embeddings:         {}", stats.total_embeddings);

            match &stats.embedding_model {
                Some(stored) if *stored != config.embedding.model => {
                    println!(
                        "Embedding model:    {stored} (configured: {}, run `mnemo index --rebuild`)",
                        config.embedding.model
                    );
                }
                Some(stored) => println!("Embedding model:    {stored}"),
                None => println!("Embedding model:    (none recorded)"),
            }

            if !stats.recent_files.is_empty() {
                println!();
                println!("Recently indexed:");
                for file in &stats.recent_files {
                    println!(
                        "  {:<40} {:>4} chunks  {}",
                        file.file_path, file.chunks, file.last_updated
                    );
                }
            }
        }
        Err(db::StoreError::NotFound(_)) => {
            println!("Status:             not created yet (run `mnemo index`)");
        }
        Err(e) => return Err(e.into()),
    }

    // Memory files
    let memory_file = config.resolved_memory_file();
    let memory_dir = config.resolved_memory_dir();
    println!();
    println!(
        "Memory file:        {} ({})",
        memory_file.display(),
        if memory_file.is_file() { "present" } else { "missing" }
    );

    let logs = daily_logs(&memory_dir);
    println!("Daily logs:         {}", logs.len());
    if let Some((date, _)) = logs.last() {
        println!("Latest log:         {date}");
    }

    let today = chrono::Local::now().date_naive();
    match logs.iter().find(|(date, _)| *date == today) {
        Some((_, path)) => {
            let lines = std::fs::read_to_string(path)
                .map(|text| text.lines().count())
                .unwrap_or(0);
            println!("Today's log:        {lines} lines");
        }
        None => println!("Today's log:        not started"),
    }

    Ok(())
}

/// `YYYY-MM-DD.md` files directly under `dir`, oldest first.
fn daily_logs(dir: &Path) -> Vec<(NaiveDate, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut logs: Vec<(NaiveDate, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let date = NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()?;
            Some((date, path))
        })
        .collect();
    logs.sort();
    logs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_logs_are_dated_markdown_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2026-03-02.md", "2026-01-15.md", "projects.md", "2026-02-01.txt"] {
            std::fs::write(dir.path().join(name), "x\n").unwrap();
        }
        let logs = daily_logs(dir.path());
        let dates: Vec<String> = logs.iter().map(|(d, _)| d.to_string()).collect();
        assert_eq!(dates, vec!["2026-01-15", "2026-03-02"]);
    }

    #[test]
    fn missing_dir_has_no_logs() {
        assert!(daily_logs(Path::new("/nonexistent/mnemo/memory")).is_empty());
    }
}

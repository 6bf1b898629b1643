use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use mnemo::config::MnemoConfig;
use mnemo::db;
use mnemo::memory::ingest::{self, IngestPipeline};
use mnemo::memory::store;

/// Index the given files, or every memory file when `paths` is empty.
pub async fn index(config: &MnemoConfig, paths: Vec<PathBuf>, rebuild: bool) -> Result<()> {
    let pipeline = IngestPipeline::from_config(config, super::provider(config));
    let db_path = config.resolved_db_path();

    let files: Vec<PathBuf> = if paths.is_empty() {
        ingest::discover(&config.resolved_memory_file(), &config.resolved_memory_dir())
    } else {
        paths.iter().map(|p| pipeline.resolve(p)).collect()
    };

    if files.is_empty() {
        println!(
            "No memory files found (looked for {} and {}/**/*.md).",
            config.resolved_memory_file().display(),
            config.resolved_memory_dir().display()
        );
        return Ok(());
    }

    if rebuild {
        println!("Rebuilding {} file(s) from scratch...", files.len());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let bar = pb.clone();
    let (failed, total) = tokio::task::spawn_blocking(move || -> Result<(usize, usize)> {
        let mut conn = db::open_database(&db_path)?;
        let mut failed = 0;

        for file in &files {
            bar.set_message(pipeline.relative_path(file));
            match pipeline.ingest(&mut conn, file, rebuild) {
                Ok(report) => bar.println(ingest::report_line(&report)),
                Err(e) => {
                    failed += 1;
                    bar.println(format!("Failed {}: {e:#}", file.display()));
                }
            }
            bar.inc(1);
        }

        Ok((failed, store::count_chunks(&conn)?))
    })
    .await
    .context("indexing task panicked")??;

    pb.finish_and_clear();
    println!("\nTotal chunks in database: {total}");
    anyhow::ensure!(failed == 0, "{failed} file(s) could not be indexed");
    Ok(())
}

//! `reader`: terminal host for the reading engine.

mod cli;
mod local_source;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Parser;
use log::LevelFilter;
use reader_engine::{ensure_data_dir, EngineConfig, ReaderEngine};
use reader_logging::reader_info;
use tokio::runtime::Runtime;

use crate::cli::{Cli, Command};
use crate::local_source::LocalFiles;

const DEFAULT_CONFIG_FILENAME: &str = "reader.ron";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILENAME)),
    };
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }
    ensure_data_dir(&config.data_dir)
        .with_context(|| format!("Cannot use data dir {}", config.data_dir.display()))?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    reader_logging::initialize(cli.log, &config.log_path(), level);
    reader_info!("Starting reader with {:?}", config);

    let runtime = Runtime::new().context("Failed to start async runtime")?;
    let engine = ReaderEngine::new(config, Arc::new(LocalFiles::new()))
        .context("Failed to open library")?;

    match cli.command {
        Command::Open { path, capacity } => {
            repl::read_book(&runtime, &engine, &book_id_for(&path), capacity)
        }
        Command::Add { paths } => cmd_add(&runtime, &engine, &paths),
        Command::Remove { path } => cmd_remove(&engine, &path),
        Command::Library => cmd_library(&engine),
        Command::Progress { path } => cmd_progress(&engine, &path),
    }
}

/// Canonical path when the file exists, so the same book opened from
/// different directories maps to one progress record.
fn book_id_for(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .into_owned()
}

fn cmd_add(runtime: &Runtime, engine: &ReaderEngine, paths: &[PathBuf]) -> Result<()> {
    let mut failed = 0usize;
    for path in paths {
        match runtime.block_on(engine.import_book(&book_id_for(path))) {
            Ok(summary) => println!(
                "Added {} ({} chapters)",
                summary.title, summary.total_chapters
            ),
            Err(err) => {
                eprintln!("{err}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} books could not be added", paths.len());
    }
    Ok(())
}

fn cmd_remove(engine: &ReaderEngine, path: &Path) -> Result<()> {
    let book_id = book_id_for(path);
    if engine.remove_book(&book_id)? {
        println!("Removed {book_id}");
    } else {
        println!("Not in library: {book_id}");
    }
    Ok(())
}

fn cmd_library(engine: &ReaderEngine) -> Result<()> {
    let rows = engine.library_summaries()?;
    if rows.is_empty() {
        println!("Library is empty.");
        return Ok(());
    }
    println!("{:>5}  {:<16}  {:<32}  AT", "DONE", "LAST READ", "TITLE");
    for row in rows {
        let last_read = DateTime::from_timestamp_millis(row.last_read_timestamp)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let title = match &row.author {
            Some(author) => format!("{} ({author})", row.title),
            None => row.title.clone(),
        };
        println!(
            "{:>4.0}%  {:<16}  {:<32}  {}",
            row.fraction() * 100.0,
            last_read,
            title,
            row.last_chapter_title
        );
    }
    Ok(())
}

fn cmd_progress(engine: &ReaderEngine, path: &Path) -> Result<()> {
    let book_id = book_id_for(path);
    let progress = engine.progress_of(&book_id);
    if progress.total_chapters == 0 {
        println!("{book_id} has not been read yet.");
        return Ok(());
    }
    println!(
        "{book_id}: chapter {}/{} ({}), page {}/{}",
        progress.chapter_index + 1,
        progress.total_chapters,
        progress.last_chapter_title,
        progress.page_index + 1,
        progress.total_pages_in_chapter
    );
    Ok(())
}

//! CLI commands implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use futures::future::join_all;

use crate::config::Settings;
use crate::extract::ExtractedActivity;
use crate::repository::migrations::run_migrations;
use crate::repository::{activity, AsyncSqlitePool};
use crate::scrapers::{adapter_for, PageFetcher, SOURCE_IDS};
use crate::services::{IngestOutcome, IngestRunner};

#[derive(Parser)]
#[command(name = "fieldtrip")]
#[command(about = "Free museum activity aggregation and crawling system")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and create tables
    Init,

    /// Crawl one or more sources and upsert their activities
    Crawl {
        /// Source IDs to crawl (met, mfa, moma-teens, moma-kids, whitney)
        sources: Vec<String>,
        /// Crawl all known sources
        #[arg(short, long)]
        all: bool,
        /// Extract and print rows without touching the database
        #[arg(long)]
        dry_run: bool,
        /// Directory to save raw HTML snapshots of fetched pages
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Show row counts per table and per source
    Status,

    /// Start the read API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Init => cmd_init(&settings).await,
        Commands::Crawl {
            sources,
            all,
            dry_run,
            cache_dir,
        } => cmd_crawl(&settings, &sources, all, dry_run, cache_dir.as_deref()).await,
        Commands::Status => cmd_status(&settings).await,
        Commands::Serve { host, port } => cmd_serve(&settings, &host, port).await,
    }
}

async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let pool = AsyncSqlitePool::from_path(&settings.database_path);
    let mut conn = pool.get().await?;
    run_migrations(&mut conn).await?;
    println!(
        "{} database ready at {}",
        style("✓").green(),
        settings.database_path.display()
    );
    Ok(())
}

async fn cmd_crawl(
    settings: &Settings,
    sources: &[String],
    all: bool,
    dry_run: bool,
    cache_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let requested = requested_sources(sources, all)?;

    if let Some(dir) = cache_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating cache dir {}", dir.display()))?;
    }

    let fetcher = PageFetcher::new(settings)?;
    let runner = if dry_run {
        None
    } else {
        let pool = AsyncSqlitePool::from_path(&settings.database_path);
        let mut conn = pool.get().await?;
        run_migrations(&mut conn).await?;
        Some(IngestRunner::new(pool))
    };

    let tasks = requested.iter().map(|id| {
        let runner = runner.clone();
        run_source(id, &fetcher, settings, runner, dry_run, cache_dir)
    });
    let results = join_all(tasks).await;

    let mut failures = 0;
    for (id, result) in requested.iter().zip(results) {
        match result {
            Ok(()) => {}
            Err(err) => {
                failures += 1;
                eprintln!("{} {id}: {err:#}", style("✗").red());
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} sources failed", requested.len());
    }
    Ok(())
}

/// Resolve and validate the requested source list; duplicates are dropped so
/// the same source never runs twice in one invocation.
fn requested_sources(sources: &[String], all: bool) -> anyhow::Result<Vec<String>> {
    let mut seen = HashSet::new();
    let requested: Vec<String> = if all {
        SOURCE_IDS.iter().map(|id| id.to_string()).collect()
    } else {
        sources
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    };

    if requested.is_empty() {
        bail!(
            "no sources requested; pass source ids or --all (known: {})",
            SOURCE_IDS.join(", ")
        );
    }
    for id in &requested {
        if adapter_for(id).is_none() {
            bail!("unknown source '{id}' (known: {})", SOURCE_IDS.join(", "));
        }
    }
    Ok(requested)
}

async fn run_source(
    id: &str,
    fetcher: &PageFetcher,
    settings: &Settings,
    runner: Option<IngestRunner>,
    dry_run: bool,
    cache_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let Some(adapter) = adapter_for(id) else {
        bail!("unknown source '{id}'");
    };
    println!(
        "{} {} ({})",
        style("→").cyan(),
        adapter.display_name(),
        adapter.list_url()
    );

    let pages = adapter
        .fetch_pages(fetcher, settings)
        .await
        .with_context(|| format!("fetching {id}"))?;

    if let Some(dir) = cache_dir {
        write_page_cache(dir, id, &pages)?;
    }

    let mut rows = Vec::new();
    for page in &pages {
        rows.extend(adapter.extract(page));
    }
    println!(
        "  {} pages fetched, {} rows extracted",
        pages.len(),
        rows.len()
    );

    if dry_run {
        print_rows(&rows);
        return Ok(());
    }

    let Some(runner) = runner else {
        bail!("no database runner configured");
    };
    let IngestOutcome {
        deduped,
        inserted,
        updated,
    } = runner
        .upsert_extracted(adapter.list_url(), rows, adapter.adapter_type())
        .await
        .with_context(|| format!("committing {id}"))?;
    println!(
        "  {} committed: {} deduped, {} inserted, {} updated",
        style("✓").green(),
        deduped.len(),
        inserted,
        updated
    );
    Ok(())
}

fn write_page_cache(dir: &Path, id: &str, pages: &[String]) -> anyhow::Result<()> {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    for (index, page) in pages.iter().enumerate() {
        let path = dir.join(format!("{id}_{index}_{stamp}.html"));
        std::fs::write(&path, page)
            .with_context(|| format!("writing cache file {}", path.display()))?;
    }
    Ok(())
}

fn print_rows(rows: &[ExtractedActivity]) {
    for row in rows {
        println!(
            "  {} {}",
            style(row.start_at.format("%Y-%m-%d %H:%M")).yellow(),
            style(&row.title).bold()
        );
        println!("      {}", row.source_url);
        if let Some(description) = &row.description {
            println!("      {}", truncate(description, 120));
        }
        println!(
            "      ages {:?}-{:?}  drop_in {:?}  free {}",
            row.age_min,
            row.age_max,
            row.drop_in,
            row.free_verification_status.as_str()
        );
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    }
}

async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let pool = AsyncSqlitePool::from_path(&settings.database_path);
    let mut conn = pool.get().await?;

    let (sources, venues, activities) = activity::table_counts(&mut conn).await?;
    println!("{}", style("fieldtrip status").bold());
    println!("  database:   {}", settings.database_path.display());
    println!("  sources:    {sources}");
    println!("  venues:     {venues}");
    println!("  activities: {activities}");

    let per_source = activity::counts_by_source(&mut conn).await?;
    if !per_source.is_empty() {
        println!("  by source:");
        for (name, count) in per_source {
            println!("    {name}: {count}");
        }
    }
    Ok(())
}

async fn cmd_serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let pool = AsyncSqlitePool::from_path(&settings.database_path);
    let mut conn = pool.get().await?;
    run_migrations(&mut conn).await?;
    drop(conn);

    crate::server::serve(pool, host, port).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_sources_dedup() {
        let sources = vec!["met".to_string(), "mfa".to_string(), "met".to_string()];
        let requested = requested_sources(&sources, false).unwrap();
        assert_eq!(requested, vec!["met".to_string(), "mfa".to_string()]);
    }

    #[test]
    fn test_requested_sources_all() {
        let requested = requested_sources(&[], true).unwrap();
        assert_eq!(requested.len(), SOURCE_IDS.len());
    }

    #[test]
    fn test_requested_sources_validation() {
        assert!(requested_sources(&[], false).is_err());
        assert!(requested_sources(&["guggenheim".to_string()], false).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcde…");
    }
}

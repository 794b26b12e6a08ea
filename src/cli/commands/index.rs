//! Index command implementation.

use anyhow::Result;
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use super::{confirm, open_retriever};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::IngestReport;
use crate::utils::{collect_files, source_name};

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// Add files or directories to the index
    Add {
        /// Files or directories to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Remove every chunk that came from a source file
    Delete {
        /// Source file name as shown by `index sources`
        #[arg(required = true)]
        source: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },

    /// Remove all indexed chunks and the persisted snapshot
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },

    /// List indexed source files
    Sources,
}

pub async fn handle_index(
    cmd: IndexCommand,
    format: OutputFormat,
    verbose: bool,
    offline: bool,
) -> Result<()> {
    let config = Config::load()?;

    match cmd {
        IndexCommand::Add { paths } => handle_add(&config, paths, format, verbose, offline).await,
        IndexCommand::Delete { source, force } => {
            handle_delete(&config, &source, force, format, offline).await
        }
        IndexCommand::Clear { force } => handle_clear(&config, force, format, offline).await,
        IndexCommand::Sources => handle_sources(&config, format, offline).await,
    }
}

async fn handle_add(
    config: &Config,
    paths: Vec<PathBuf>,
    format: OutputFormat,
    verbose: bool,
    offline: bool,
) -> Result<()> {
    for path in &paths {
        if !path.exists() {
            anyhow::bail!("path does not exist: {}", path.display());
        }
    }

    let files = collect_files(&paths, &config.indexing.supported_extensions);
    let formatter = get_formatter(format);

    if files.is_empty() {
        println!(
            "{}",
            formatter.format_message(&format!(
                "No supported files found (extensions: {})",
                config.indexing.supported_extensions.join(", ")
            ))
        );
        return Ok(());
    }

    if verbose {
        eprintln!("Found {} files to index", files.len());
    }

    let retriever = open_retriever(config, offline)?;
    let start_time = Instant::now();

    let show_progress = format == OutputFormat::Text;
    let pb = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut report = IngestReport::default();
    for file in &files {
        if let Some(pb) = &pb {
            pb.set_message(source_name(file));
        }
        report.outcomes.push(retriever.ingest_outcome(file).await);
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let duration_ms = start_time.elapsed().as_millis() as u64;
    print!("{}", formatter.format_ingest_report(&report, duration_ms));

    Ok(())
}

async fn handle_delete(
    config: &Config,
    source: &str,
    force: bool,
    format: OutputFormat,
    offline: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let retriever = open_retriever(config, offline)?;

    let sources = retriever.sources().await?;
    if !sources.iter().any(|s| s == source) {
        println!(
            "{}",
            formatter.format_message(&format!("No indexed chunks found for '{}'", source))
        );
        return Ok(());
    }

    if !force && !confirm(&format!("This will remove '{}' from the index. Continue?", source))? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = retriever.delete_source(source).await?;
    let message = if removed {
        format!("Removed '{}' from the index", source)
    } else {
        format!("No indexed chunks found for '{}'", source)
    };
    println!("{}", formatter.format_message(&message));

    Ok(())
}

async fn handle_clear(
    config: &Config,
    force: bool,
    format: OutputFormat,
    offline: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    if !force && !confirm("This will delete ALL indexed chunks. Continue?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let retriever = open_retriever(config, offline)?;
    let count = retriever.count().await?;
    retriever.clear().await?;

    println!(
        "{}",
        formatter.format_message(&format!("Cleared {} chunks from the index", count))
    );

    Ok(())
}

async fn handle_sources(config: &Config, format: OutputFormat, offline: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let retriever = open_retriever(config, offline)?;

    let sources = retriever.sources().await?;
    print!("{}", formatter.format_sources(&sources));

    Ok(())
}

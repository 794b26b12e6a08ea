//! CLI module for the document retrieval tool.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Index local documents and retrieve the passages closest to a question.
#[derive(Debug, Parser)]
#[command(name = "docrag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        env = "DOCRAG_OFFLINE",
        help = "Use the local hashing embedder instead of the embedding server"
    )]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show index status (backend, chunk and source counts)
    Status,

    /// Manage the document index (add, delete, clear, sources)
    #[command(subcommand)]
    Index(commands::IndexCommand),

    /// Retrieve the chunks nearest to a query
    Search(commands::SearchArgs),

    /// Browse saved conversations
    #[command(subcommand)]
    History(commands::HistoryCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

mod config;
mod history;
mod index;
mod search;
mod status;

pub use config::ConfigCommand;
pub use history::HistoryCommand;
pub use index::IndexCommand;
pub use search::SearchArgs;

pub use config::handle_config;
pub use history::handle_history;
pub use index::handle_index;
pub use search::handle_search;
pub use status::handle_status;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::{Retriever, create_provider};

/// Open the configured index with the embedding provider picked by `offline`.
fn open_retriever(config: &Config, offline: bool) -> Result<Retriever> {
    let provider = create_provider(&config.embedding, offline).context(
        "failed to set up the embedding provider (set EMBEDDING_API_KEY, or use --offline)",
    )?;
    Ok(Retriever::open(config, provider))
}

/// Ask for a y/N confirmation on stdin.
fn confirm(prompt: &str) -> Result<bool> {
    println!("{} [y/N]", prompt);
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

use anyhow::Result;

use super::open_retriever;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

pub async fn handle_status(format: OutputFormat, verbose: bool, offline: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if verbose {
        eprintln!("Index directory: {}", config.vector_store_dir().display());
    }

    let retriever = open_retriever(&config, offline)?;
    let stats = retriever.stats().await?;
    print!("{}", formatter.format_index_stats(&stats));

    Ok(())
}

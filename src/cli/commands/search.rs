use anyhow::Result;
use clap::Args;
use std::time::Instant;

use super::open_retriever;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, SearchResults};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Question or search text")]
    pub query: String,

    #[arg(long, short = 'k', help = "Number of chunks to return")]
    pub top_k: Option<usize>,

    #[arg(long, help = "Show the distance of each chunk (lower is closer)")]
    pub scores: bool,
}

pub async fn handle_search(
    args: SearchArgs,
    format: OutputFormat,
    verbose: bool,
    offline: bool,
) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }
    if args.top_k == Some(0) {
        anyhow::bail!("top_k must be at least 1");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let retriever = open_retriever(&config, offline)?;

    let start_time = Instant::now();
    let k = args.top_k.unwrap_or_else(|| retriever.top_k());
    let results = retriever.search_with_scores(query, Some(k)).await?;
    let duration_ms = start_time.elapsed().as_millis() as u64;

    if verbose {
        eprintln!(
            "Retrieved {} of {} chunks in {}ms ({})",
            results.len(),
            retriever.count().await?,
            duration_ms,
            retriever.driver().await
        );
    }

    let results = SearchResults::new(query.to_string(), results, duration_ms);
    print!("{}", formatter.format_search_results(&results, args.scores));

    Ok(())
}

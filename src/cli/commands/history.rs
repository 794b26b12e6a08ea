//! Conversation history commands.

use anyhow::{Context, Result};
use clap::Subcommand;

use super::confirm;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::ConversationStore;

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List saved conversations, most recently updated first
    List,

    /// Show a full conversation
    Show {
        #[arg(required = true)]
        id: String,
    },

    /// Delete a saved conversation
    Delete {
        #[arg(required = true)]
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },
}

pub async fn handle_history(cmd: HistoryCommand, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let dir = config.conversations_dir();
    if verbose {
        eprintln!("Conversations directory: {}", dir.display());
    }
    let store = ConversationStore::open(&dir)
        .with_context(|| format!("failed to open conversations in {}", dir.display()))?;

    match cmd {
        HistoryCommand::List => {
            let conversations = store.list()?;
            print!("{}", formatter.format_conversations(&conversations));
        }
        HistoryCommand::Show { id } => match store.load(&id)? {
            Some(conversation) => print!("{}", formatter.format_conversation(&conversation)),
            None => anyhow::bail!("conversation not found: {}", id),
        },
        HistoryCommand::Delete { id, force } => {
            if !force && !confirm(&format!("This will delete conversation '{}'. Continue?", id))? {
                println!("Cancelled.");
                return Ok(());
            }

            let message = if store.delete(&id)? {
                format!("Deleted conversation {}", id)
            } else {
                format!("Conversation not found: {}", id)
            };
            println!("{}", formatter.format_message(&message));
        }
    }

    Ok(())
}

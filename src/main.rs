use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use docrag::cli::commands::{
    handle_config, handle_history, handle_index, handle_search, handle_status,
};
use docrag::cli::output::get_formatter;
use docrag::cli::{Cli, Commands};
use docrag::models::{Config, OutputFormat};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "docrag=debug" } else { "docrag=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load()
            .map(|c| c.search.default_format)
            .unwrap_or_default(),
    };
    let verbose = cli.verbose;
    let offline = cli.offline;

    tokio::select! {
        result = run_command(cli.command, format, verbose, offline) => {
            if let Err(e) = result {
                eprint!("{}", get_formatter(format).format_error(&format!("{:#}", e)));
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    format: OutputFormat,
    verbose: bool,
    offline: bool,
) -> Result<()> {
    match command {
        Commands::Status => {
            handle_status(format, verbose, offline).await?;
        }
        Commands::Index(cmd) => {
            handle_index(cmd, format, verbose, offline).await?;
        }
        Commands::Search(args) => {
            handle_search(args, format, verbose, offline).await?;
        }
        Commands::History(cmd) => {
            handle_history(cmd, format, verbose).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, format, verbose).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

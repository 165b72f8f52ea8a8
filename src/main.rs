use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{debug, warn};

use recipe_notion_import::fetch::PageFetcher;
use recipe_notion_import::llm::AnthropicProvider;
use recipe_notion_import::notion::NotionClient;
use recipe_notion_import::{ImportConfig, Orchestrator};

#[derive(Parser)]
#[command(name = "recipe-import")]
#[command(about = "Extract recipes from web pages and import them into Notion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a recipe from a page and import it (Ctrl-C cancels)
    Import {
        /// Page URL
        url: String,
        /// Read the page from a saved HTML file instead of fetching it
        #[arg(long)]
        html_file: Option<PathBuf>,
    },
    /// Show the category options used for extraction
    Categories {
        /// Fetch options from the database even if the cache is fresh
        #[arg(long)]
        refresh: bool,
    },
    /// Check the Claude and Notion credentials
    Check,
    /// Show the current session and the last import
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = ImportConfig::load()?;
    debug!("Using state file {}", config.state_path.display());

    match cli.command {
        Commands::Import { url, html_file } => import(&config, &url, html_file).await?,
        Commands::Categories { refresh } => {
            let orchestrator = Orchestrator::from_config(&config).await?;
            let options = if refresh {
                orchestrator.refresh_categories().await
            } else {
                orchestrator.categories().await
            };
            for option in options {
                println!("{}", option);
            }
        }
        Commands::Check => check(&config).await,
        Commands::Status => {
            let status = Orchestrator::from_config(&config).await?.status().await;
            if let Some(marker) = status.stale_session {
                println!(
                    "Cleared stuck session {} (started {})",
                    marker.session_id, marker.started_at
                );
            }
            match status.last_import {
                Some(last) => {
                    println!("Last import: {:?} at {}", last.status, last.at);
                    if let Some(url) = last.remote_url {
                        println!("  {}", url);
                    }
                    if let Some(error) = last.error {
                        println!("  {}", error);
                    }
                }
                None => println!("No import recorded yet"),
            }
        }
    }

    Ok(())
}

async fn import(
    config: &ImportConfig,
    url: &str,
    html_file: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let page = match html_file {
        Some(path) => PageFetcher::from_file(url, path).await?,
        None => PageFetcher::new(config.request_timeout())?.fetch(url).await?,
    };

    let orchestrator = Arc::new(Orchestrator::from_config(config).await?);
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("{}", event.message);
        }
    });

    let mut handle = orchestrator.clone().spawn(page);
    let result = tokio::select! {
        joined = &mut handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling import");
            orchestrator.cancel().await;
            handle.await?
        }
    };

    let imported = result?;
    println!("{}", imported.remote_url);
    Ok(())
}

async fn check(config: &ImportConfig) {
    match AnthropicProvider::new(config).check_connection().await {
        Ok(()) => println!("Claude: ok"),
        Err(e) => println!("Claude: {}", e),
    }
    match NotionClient::new(config).check_connection().await {
        Ok(()) => println!("Notion: ok"),
        Err(e) => println!("Notion: {}", e),
    }
}

//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::analysis;
use crate::config::Settings;
use crate::server;

#[derive(Parser)]
#[command(name = "reviewlens")]
#[command(about = "Review collection and keyword analysis for storefront listings")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

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
    /// Collect reviews from a listing and analyze them against keywords
    Analyze {
        /// Listing URL
        url: String,
        /// Keyword to analyze (repeatable)
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,
        /// Target number of reviews per rating category
        #[arg(short, long)]
        target: Option<usize>,
    },

    /// Start the API server
    Serve {
        /// Address to bind to (overrides the configured host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (overrides the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            url,
            keywords,
            target,
        } => cmd_analyze(settings, &url, &keywords, target).await,
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            server::serve(settings, &host, port).await
        }
    }
}

async fn cmd_analyze(
    mut settings: Settings,
    url: &str,
    keywords: &[String],
    target: Option<usize>,
) -> anyhow::Result<()> {
    if let Some(target) = target {
        settings.crawl.max_records_per_category = target;
    }

    let envelope = analysis::analyze_listing(&settings, url, keywords).await?;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    eprintln!(
        "analyzed {} reviews (analysis id {})",
        envelope.records_collected, envelope.analysis_id
    );
    Ok(())
}

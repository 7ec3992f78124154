//! fara-principals main entry point
//!
//! Command-line interface for crawling the FARA foreign principal registry.

use anyhow::Context;
use clap::Parser;
use fara_principals::config::{load_config_with_hash, validate, Config};
use fara_principals::crawler::crawl;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// fara-principals: foreign principal registrations from efile.fara.gov
///
/// Walks the registry's interactive report, collects every active foreign
/// principal registration with its exhibit documents and writes them to a
/// JSON feed.
#[derive(Parser, Debug)]
#[command(name = "fara-principals")]
#[command(version)]
#[command(about = "Crawl FARA foreign principal registrations", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Write items to this path instead of the configured one
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(output) = &cli.output {
        config.output.items_path = output.display().to_string();
    }
    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fara_principals=info,warn"),
            1 => EnvFilter::new("fara_principals=debug,info"),
            2 => EnvFilter::new("fara_principals=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows the effective configuration
fn print_dry_run(config: &Config) {
    println!("=== fara-principals Dry Run ===\n");

    println!("Site:");
    println!("  Start URL: {}", config.site.start_url);
    println!("  Postback URL: {}", config.site.postback_url);

    println!("\nCrawler:");
    println!("  Download delay: {}ms", config.crawler.download_delay);
    println!(
        "  Max concurrent exhibits: {}",
        config.crawler.max_concurrent_exhibits
    );
    println!(
        "  Retries: {} ({}ms apart)",
        config.crawler.max_retries, config.crawler.retry_delay
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Items: {}", config.output.items_path);
    println!("  Format: {:?}", config.output.format);

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let items_path = config.output.items_path.clone();

    match crawl(config).await {
        Ok(stats) => {
            tracing::info!("Crawl completed: {} records written to {}", stats.records, items_path);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed ({}): {}", e.reason(), e);
            Err(e).context(format!("Partial output kept in {}", items_path))
        }
    }
}

//! Crawl Gateway - an HTTP crawl API driven by a hot-reloadable JSON configuration.
//!
//! The configuration facade resolves layered sections (browser, crawl run,
//! markdown generator, content filter) into typed settings, caches them per
//! file revision and never fails: faults are logged and defaults substituted.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod service;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use crate::cli::{Cli, Commands, ServeArgs};
use crate::config::ConfigManager;
use crate::engine::HttpEngine;
use crate::service::{CrawlService, Metrics, Server};
use crate::validation::report::format_report;

/// Runs the crawl gateway with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level())?;

    match cli.command {
        Commands::Serve(args) => serve(args, &cli.config).await,
        Commands::ConfigValidate => validate_config(&cli.config),
        Commands::ConfigShow => show_config(&cli.config),
        Commands::Crawl { url } => crawl_once(&cli.config, &url).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Builds the crawl service around a configuration manager.
fn build_service(config: Arc<ConfigManager>) -> Result<Arc<CrawlService>> {
    let metrics = Arc::new(Metrics::new()?);
    Ok(Arc::new(CrawlService::new(
        config,
        Arc::new(HttpEngine::new()),
        metrics,
    )))
}

/// Serves the HTTP API until Ctrl+C.
async fn serve(args: ServeArgs, config_path: &Path) -> Result<()> {
    info!(config = %config_path.display(), "Starting crawl gateway");

    let config = Arc::new(ConfigManager::with_hot_reload(config_path));
    let service = build_service(config.clone())?;

    let server = Server::bind(&args.bind, service).await?;
    info!(addr = %server.local_addr()?, "Crawl gateway is running. Press Ctrl+C to stop.");

    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    config.stop();
    info!("Crawl gateway stopped");
    Ok(())
}

/// Resolves every section once and prints all diagnostics.
fn validate_config(config_path: &Path) -> Result<()> {
    let result = ConfigManager::new(config_path).validate();
    println!("{}", format_report(&result));

    if !result.is_valid() {
        bail!(
            "Config file '{}' is unusable ({} error(s))",
            config_path.display(),
            result.error_count()
        );
    }
    Ok(())
}

/// Prints every resolved section as JSON.
fn show_config(config_path: &Path) -> Result<()> {
    let snapshot = ConfigManager::new(config_path).snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Crawls one URL and prints the response.
async fn crawl_once(config_path: &Path, url: &str) -> Result<()> {
    let service = build_service(Arc::new(ConfigManager::new(config_path)))?;
    let response = service.crawl(url).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

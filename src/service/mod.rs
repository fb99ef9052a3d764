//! Crawl request handling and the HTTP service around it.

pub mod metrics;
pub mod server;

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{BrowserSettings, ConfigManager, CrawlRunSettings, OutputFormat};
use crate::engine::{CrawlEngine, CrawlJob};
use crate::error::CrawlError;
use crate::validation::url::normalize_url;

pub use metrics::{CrawlOutcome, Metrics};
pub use server::Server;

/// Body returned for a crawl that reached the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResponse {
    pub success: bool,
    pub content: Option<String>,
    pub error_message: Option<String>,
}

/// Runs crawls with the settings currently in force.
pub struct CrawlService {
    config: Arc<ConfigManager>,
    engine: Arc<dyn CrawlEngine>,
    metrics: Arc<Metrics>,
}

impl CrawlService {
    pub fn new(config: Arc<ConfigManager>, engine: Arc<dyn CrawlEngine>, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            engine,
            metrics,
        }
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Normalizes `raw_url`, crawls it and extracts the configured output format.
    pub async fn crawl(&self, raw_url: &str) -> Result<CrawlResponse, CrawlError> {
        let url = match normalize_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                self.metrics.record(CrawlOutcome::Rejected);
                warn!(url = %raw_url, error = %e, "Rejected crawl request");
                return Err(e.into());
            }
        };

        let RequestSettings {
            browser,
            run,
            format,
            generation,
        } = self.current_settings().await;
        self.metrics.set_config_generation(generation);

        let started = Instant::now();
        let outcome = self
            .engine
            .crawl(CrawlJob {
                url: url.clone(),
                browser,
                run,
            })
            .await;
        self.metrics.observe_duration(started.elapsed().as_secs_f64());

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.metrics.record(CrawlOutcome::Error);
                warn!(url = %url, error = %e, "Crawl engine failed");
                return Err(e.into());
            }
        };

        if !result.success {
            self.metrics.record(CrawlOutcome::Failure);
            info!(url = %url, error = ?result.error_message, "Crawl unsuccessful");
            return Ok(CrawlResponse {
                success: false,
                content: None,
                error_message: result.error_message,
            });
        }

        self.metrics.record(CrawlOutcome::Success);
        let content = result.content_for(format).map(str::to_string);
        if content.is_none() {
            info!(url = %url, format = %format, "Engine produced no content for the output format");
        }
        info!(url = %url, format = %format, "Crawl complete");

        Ok(CrawlResponse {
            success: true,
            content,
            error_message: None,
        })
    }

    /// Resolves the request's settings on the blocking pool, since a cache miss
    /// reads and parses the config file.
    async fn current_settings(&self) -> RequestSettings {
        let config = self.config.clone();
        match tokio::task::spawn_blocking(move || RequestSettings::read(&config)).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Settings task failed, resolving inline");
                RequestSettings::read(&self.config)
            }
        }
    }
}

/// Settings in force for one crawl.
struct RequestSettings {
    browser: Arc<BrowserSettings>,
    run: Arc<CrawlRunSettings>,
    format: OutputFormat,
    generation: u64,
}

impl RequestSettings {
    fn read(config: &ConfigManager) -> Self {
        Self {
            browser: config.load_browser_config(),
            run: config.load_crawler_config(),
            format: config.load_output_format(),
            generation: config.generation(),
        }
    }
}

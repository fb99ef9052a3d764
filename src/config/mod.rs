//! Configuration loading, resolution, caching and hot-reload management.
//!
//! # Data Flow
//! ```text
//! caller → ConfigManager::load_*()
//!     → cache.rs (hit: return the shared value)
//!     → loader.rs (miss: parse the file once per epoch)
//!     → builders.rs (typed settings, defaults on any fault)
//!     → cache.rs (store, tagged with the epoch it was built in)
//!
//! On file change:
//!     hot_reload.rs detects the event
//!     → re-checks the config path
//!     → cache.rs starts a new, empty epoch
//! ```

pub mod builders;
pub mod cache;
pub mod hot_reload;
pub mod loader;
pub mod model;
pub mod section;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use self::builders::SectionBuilder;
use self::cache::{ResolutionCache, ResolvedConfig};
use self::hot_reload::{ConfigWatcher, WatcherHandle};
use self::section::{ConfigDocument, SectionKey};
use crate::validation::{paths, ValidationIssue, ValidationResult};

pub use model::{
    BrowserSettings, CacheMode, ContentFilterChoice, ContentFilterSettings, CrawlRunSettings,
    MarkdownGeneratorSettings, OutputFormat,
};

/// Default location of the configuration file, relative to the install root.
pub const DEFAULT_CONFIG_PATH: &str = "./config/config.json";

/// Entry point for every configuration lookup.
///
/// Each `load_*` call always returns a usable value; faults are logged and
/// replaced by defaults.
pub struct ConfigManager {
    config_path: PathBuf,
    cache: Arc<ResolutionCache>,
    watcher: Mutex<Option<WatcherHandle>>,
}

impl ConfigManager {
    /// Creates a manager without hot reload.
    pub fn new(config_path: &Path) -> Self {
        let gate_open = match paths::check(config_path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Config file unusable, every section will use its default");
                false
            }
        };

        Self {
            config_path: config_path.to_path_buf(),
            cache: Arc::new(ResolutionCache::new(gate_open)),
            watcher: Mutex::new(None),
        }
    }

    /// Creates a manager whose cache is invalidated whenever the file changes.
    ///
    /// A watcher that cannot start is logged and the manager runs without hot reload.
    pub fn with_hot_reload(config_path: &Path) -> Self {
        let manager = Self::new(config_path);
        manager.start_watcher();
        manager
    }

    /// Starts the file watcher if it is not already running.
    pub fn start_watcher(&self) -> bool {
        let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return true;
        }

        match ConfigWatcher::new(&self.config_path, self.cache.clone()).start() {
            Ok(handle) => {
                *slot = Some(handle);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload disabled");
                false
            }
        }
    }

    /// Stops the file watcher, blocking until its thread has exited.
    pub fn stop(&self) {
        let handle = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut handle) = handle {
            handle.stop();
        }
    }

    /// True while the file watcher is running.
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(WatcherHandle::is_running)
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current cache epoch; increases on every invalidation.
    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    /// Whether the config path passed validation for the current epoch.
    pub fn is_config_usable(&self) -> bool {
        self.cache.gate_open()
    }

    /// Drops every cached value and re-checks the config path.
    pub fn invalidate(&self) -> u64 {
        let generation = self.cache.invalidate(paths::is_usable(&self.config_path));
        tracing::info!(generation, "Config cache invalidated");
        generation
    }

    /// Re-checks the config path, invalidating the cache if the result changed.
    pub fn revalidate(&self) -> bool {
        let usable = paths::is_usable(&self.config_path);
        if usable != self.cache.gate_open() {
            self.cache.invalidate(usable);
        }
        usable
    }

    /// Resolves `output_format`.
    pub fn load_output_format(&self) -> OutputFormat {
        self.resolve(
            SectionKey::OutputFormat,
            |builder| ResolvedConfig::OutputFormat(builder.output_format()),
            || ResolvedConfig::OutputFormat(OutputFormat::default()),
        )
        .into_output_format()
        .unwrap_or_default()
    }

    /// Resolves `browser_config`.
    pub fn load_browser_config(&self) -> Arc<BrowserSettings> {
        self.resolve(
            SectionKey::BrowserConfig,
            |builder| ResolvedConfig::Browser(Arc::new(builder.browser_settings())),
            || ResolvedConfig::Browser(Arc::default()),
        )
        .into_browser()
        .unwrap_or_default()
    }

    /// Resolves `crawler_run_config`, including its markdown generator chain.
    pub fn load_crawler_config(&self) -> Arc<CrawlRunSettings> {
        self.resolve(
            SectionKey::CrawlerRunConfig,
            |builder| ResolvedConfig::CrawlRun(Arc::new(builder.crawl_run_settings())),
            || ResolvedConfig::CrawlRun(Arc::default()),
        )
        .into_crawl_run()
        .unwrap_or_default()
    }

    /// Resolves the top-level `markdown_generator_config`.
    pub fn load_markdown_generator_config(&self) -> Arc<MarkdownGeneratorSettings> {
        self.resolve(
            SectionKey::MarkdownGeneratorConfig,
            |builder| ResolvedConfig::MarkdownGenerator(Arc::new(builder.markdown_generator())),
            || ResolvedConfig::MarkdownGenerator(Arc::default()),
        )
        .into_markdown_generator()
        .unwrap_or_default()
    }

    /// Resolves the filter selected by `content_filter_choice`, if any.
    pub fn load_content_filter_config(&self) -> Option<Arc<ContentFilterSettings>> {
        self.resolve(
            SectionKey::ContentFilterChoice,
            |builder| ResolvedConfig::ContentFilter(builder.content_filter().map(Arc::new)),
            || ResolvedConfig::ContentFilter(None),
        )
        .into_content_filter()
        .flatten()
    }

    /// All resolved settings of the current epoch.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let document = self.current_document();
        ConfigSnapshot {
            path: self.config_path.display().to_string(),
            generation: self.generation(),
            fingerprint: document.as_ref().and_then(|d| d.fingerprint().map(str::to_string)),
            loaded_at: document.as_ref().map(|d| d.loaded_at().to_rfc3339()),
            fault: document
                .as_ref()
                .and_then(|d| d.fault().map(|e| e.to_string())),
            output_format: self.load_output_format(),
            browser_config: self.load_browser_config(),
            crawler_run_config: self.load_crawler_config(),
            markdown_generator_config: self.load_markdown_generator_config(),
            content_filter: self.load_content_filter_config(),
        }
    }

    /// Resolves every section from a fresh read, collecting all diagnostics.
    ///
    /// Bypasses the cache; file-level faults are errors, section faults warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = paths::validate(&self.config_path);

        let document = if result.is_valid() {
            match loader::read_document(&self.config_path) {
                Ok(document) => document,
                Err(e) => {
                    result.add(ValidationIssue::error(
                        self.config_path.display().to_string(),
                        e.to_string(),
                    ));
                    ConfigDocument::empty()
                }
            }
        } else {
            ConfigDocument::empty()
        };

        let mut builder = SectionBuilder::new(&document, &mut result);
        builder.output_format();
        builder.browser_settings();
        builder.crawl_run_settings();
        builder.markdown_generator();
        builder.content_filter();

        result
    }

    /// Cache-or-build for one section.
    fn resolve(
        &self,
        key: SectionKey,
        build: impl FnOnce(&mut SectionBuilder<'_>) -> ResolvedConfig,
        fallback: impl FnOnce() -> ResolvedConfig,
    ) -> ResolvedConfig {
        let lookup = self.cache.lookup(key);
        if let Some(hit) = lookup.hit {
            return hit;
        }

        let resolved = if lookup.gate_open {
            let document = self.document_for(lookup.generation);
            // Diagnostics are surfaced through logging only.
            let mut diagnostics = ValidationResult::new();
            build(&mut SectionBuilder::new(&document, &mut diagnostics))
        } else {
            fallback()
        };

        let (stored, value) = self.cache.insert(lookup.generation, key, resolved);
        if !stored {
            tracing::debug!(section = %key, "Config changed while resolving, result not cached");
        }
        value
    }

    /// The epoch's parsed document, reading the file on first use.
    fn document_for(&self, generation: u64) -> Arc<ConfigDocument> {
        match self.cache.document(generation) {
            Some(document) => document,
            None => self
                .cache
                .store_document(generation, loader::load_document(&self.config_path)),
        }
    }

    fn current_document(&self) -> Option<Arc<ConfigDocument>> {
        let generation = self.cache.generation();
        self.cache
            .gate_open()
            .then(|| self.document_for(generation))
    }
}

impl Drop for ConfigManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Every resolved section of one epoch, for display.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub path: String,
    pub generation: u64,
    pub fingerprint: Option<String>,
    pub loaded_at: Option<String>,
    pub fault: Option<String>,
    pub output_format: OutputFormat,
    pub browser_config: Arc<BrowserSettings>,
    pub crawler_run_config: Arc<CrawlRunSettings>,
    pub markdown_generator_config: Arc<MarkdownGeneratorSettings>,
    pub content_filter: Option<Arc<ContentFilterSettings>>,
}

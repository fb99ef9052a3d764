//! In-memory resolution cache.
//!
//! The cache holds one *epoch*: the parsed document plus every value
//! resolved from it. Invalidation swaps the whole epoch for an empty one
//! under a single write lock, so a reader sees a key either fully resolved
//! or absent, never half-cleared.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::model::{
    BrowserSettings, ContentFilterSettings, CrawlRunSettings, MarkdownGeneratorSettings,
    OutputFormat,
};
use super::section::{ConfigDocument, SectionKey};

/// A typed value resolved from one section.
#[derive(Debug, Clone)]
pub enum ResolvedConfig {
    OutputFormat(OutputFormat),
    Browser(Arc<BrowserSettings>),
    CrawlRun(Arc<CrawlRunSettings>),
    MarkdownGenerator(Arc<MarkdownGeneratorSettings>),
    ContentFilter(Option<Arc<ContentFilterSettings>>),
}

impl ResolvedConfig {
    pub fn into_output_format(self) -> Option<OutputFormat> {
        match self {
            ResolvedConfig::OutputFormat(format) => Some(format),
            _ => None,
        }
    }

    pub fn into_browser(self) -> Option<Arc<BrowserSettings>> {
        match self {
            ResolvedConfig::Browser(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn into_crawl_run(self) -> Option<Arc<CrawlRunSettings>> {
        match self {
            ResolvedConfig::CrawlRun(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn into_markdown_generator(self) -> Option<Arc<MarkdownGeneratorSettings>> {
        match self {
            ResolvedConfig::MarkdownGenerator(settings) => Some(settings),
            _ => None,
        }
    }

    /// Outer `None`: not a content-filter value. Inner `None`: no filter attached.
    pub fn into_content_filter(self) -> Option<Option<Arc<ContentFilterSettings>>> {
        match self {
            ResolvedConfig::ContentFilter(filter) => Some(filter),
            _ => None,
        }
    }
}

/// Cache state for the interval between two invalidations.
#[derive(Debug)]
struct Epoch {
    generation: u64,
    gate_open: bool,
    document: Option<Arc<ConfigDocument>>,
    entries: HashMap<SectionKey, ResolvedConfig>,
}

impl Epoch {
    fn new(generation: u64, gate_open: bool) -> Self {
        Self {
            generation,
            gate_open,
            document: None,
            entries: HashMap::new(),
        }
    }
}

/// What a caller learns about the current epoch from one read.
#[derive(Debug, Clone)]
pub struct Lookup {
    /// Generation the lookup observed; pass it back to [`ResolutionCache::insert`].
    pub generation: u64,
    /// Whether the config path passed validation for this epoch.
    pub gate_open: bool,
    /// The cached value, if already resolved.
    pub hit: Option<ResolvedConfig>,
}

/// Per-facade cache of resolved sections.
#[derive(Debug)]
pub struct ResolutionCache {
    epoch: RwLock<Epoch>,
}

impl ResolutionCache {
    /// Creates an empty cache at generation 0.
    pub fn new(gate_open: bool) -> Self {
        Self {
            epoch: RwLock::new(Epoch::new(0, gate_open)),
        }
    }

    /// Looks up `key` in the current epoch.
    pub fn lookup(&self, key: SectionKey) -> Lookup {
        let epoch = self.read();
        Lookup {
            generation: epoch.generation,
            gate_open: epoch.gate_open,
            hit: epoch.entries.get(&key).cloned(),
        }
    }

    /// Stores a value resolved during `generation`.
    ///
    /// Returns false, storing nothing, if the cache was invalidated since.
    /// An earlier writer for the same key wins; its value is returned instead.
    pub fn insert(&self, generation: u64, key: SectionKey, value: ResolvedConfig) -> (bool, ResolvedConfig) {
        let mut epoch = self.write();
        if epoch.generation != generation {
            return (false, value);
        }
        let stored = epoch.entries.entry(key).or_insert(value).clone();
        (true, stored)
    }

    /// The parsed document for `generation`, if one has been stored.
    pub fn document(&self, generation: u64) -> Option<Arc<ConfigDocument>> {
        let epoch = self.read();
        if epoch.generation != generation {
            return None;
        }
        epoch.document.clone()
    }

    /// Stores the document parsed during `generation`; returns the one to use.
    pub fn store_document(&self, generation: u64, document: ConfigDocument) -> Arc<ConfigDocument> {
        let document = Arc::new(document);
        let mut epoch = self.write();
        if epoch.generation != generation {
            return document;
        }
        epoch.document.get_or_insert(document).clone()
    }

    /// Drops every resolved value and the parsed document, starting a new epoch.
    pub fn invalidate(&self, gate_open: bool) -> u64 {
        let mut epoch = self.write();
        let generation = epoch.generation + 1;
        *epoch = Epoch::new(generation, gate_open);
        generation
    }

    /// Current epoch number.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Whether the config path passed validation for the current epoch.
    pub fn gate_open(&self) -> bool {
        self.read().gate_open
    }

    /// Number of resolved sections in the current epoch.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Epoch> {
        self.epoch.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Epoch> {
        self.epoch.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_hits() {
        let cache = ResolutionCache::new(true);
        let lookup = cache.lookup(SectionKey::OutputFormat);
        assert!(lookup.hit.is_none());

        let (stored, _) = cache.insert(
            lookup.generation,
            SectionKey::OutputFormat,
            ResolvedConfig::OutputFormat(OutputFormat::Html),
        );
        assert!(stored);

        let hit = cache.lookup(SectionKey::OutputFormat).hit.unwrap();
        assert_eq!(hit.into_output_format(), Some(OutputFormat::Html));
    }

    #[test]
    fn invalidate_clears_everything_and_bumps_generation() {
        let cache = ResolutionCache::new(true);
        cache.insert(0, SectionKey::OutputFormat, ResolvedConfig::OutputFormat(OutputFormat::Html));
        cache.store_document(0, ConfigDocument::empty());
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.invalidate(false), 1);
        assert!(cache.is_empty());
        assert!(cache.document(1).is_none());
        assert!(!cache.gate_open());
    }

    #[test]
    fn writes_from_a_previous_epoch_are_dropped() {
        let cache = ResolutionCache::new(true);
        let before = cache.lookup(SectionKey::BrowserConfig).generation;
        cache.invalidate(true);

        let (stored, _) = cache.insert(
            before,
            SectionKey::BrowserConfig,
            ResolvedConfig::Browser(Arc::default()),
        );
        assert!(!stored);
        assert!(cache.lookup(SectionKey::BrowserConfig).hit.is_none());
    }

    #[test]
    fn first_writer_wins_within_an_epoch() {
        let cache = ResolutionCache::new(true);
        let first = Arc::new(BrowserSettings::default());
        cache.insert(0, SectionKey::BrowserConfig, ResolvedConfig::Browser(first.clone()));

        let (_, stored) = cache.insert(
            0,
            SectionKey::BrowserConfig,
            ResolvedConfig::Browser(Arc::new(BrowserSettings::default())),
        );
        assert!(Arc::ptr_eq(&stored.into_browser().unwrap(), &first));
    }

    #[test]
    fn one_document_per_epoch() {
        let cache = ResolutionCache::new(true);
        let first = cache.store_document(0, ConfigDocument::empty());
        let second = cache.store_document(0, ConfigDocument::empty());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&cache.document(0).unwrap(), &first));
    }
}

//! Typed section builders.
//!
//! Builders turn raw sections of a [`ConfigDocument`] into typed settings.
//! They never fail: every fault is recorded as a warning and the affected
//! value falls back to its default, or the optional child is omitted.
//!
//! # Dependency chain
//! ```text
//! crawler_run_config
//!     → markdown_generator_config        (optional, attached when non-empty)
//!         → content_filter_choice        ("pruning" | "BM25")
//!         → pruning_content_filter_config | BM25_content_filter_config
//! ```
//! A child section is looked up inside its parent mapping first, then at the
//! top level of the document.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::model::{
    Bm25FilterSettings, BrowserSettings, CacheMode, ContentFilterChoice, ContentFilterSettings,
    CrawlRunSettings, MarkdownGeneratorSettings, OutputFormat, PruningFilterSettings,
};
use super::section::{json_type_name, presence_in, ConfigDocument, Mapping, Presence, Section, SectionKey, SectionShape};
use crate::validation::{did_you_mean, ValidationIssue, ValidationResult};

/// Keys consumed by the chain resolution rather than decoded as settings fields.
const CHAIN_KEYS: [SectionKey; 3] = [
    SectionKey::ContentFilterChoice,
    SectionKey::PruningContentFilterConfig,
    SectionKey::Bm25ContentFilterConfig,
];

/// A mapping searched for child sections before the document root.
struct Parent<'m> {
    path: &'m str,
    mapping: &'m Mapping,
}

/// A usable section and the dotted path it was found at.
struct Resolved {
    path: String,
    section: Section,
}

/// Builds typed settings from one document, recording diagnostics as it goes.
pub struct SectionBuilder<'a> {
    document: &'a ConfigDocument,
    report: &'a mut ValidationResult,
}

impl<'a> SectionBuilder<'a> {
    pub fn new(document: &'a ConfigDocument, report: &'a mut ValidationResult) -> Self {
        Self { document, report }
    }

    /// Resolves `output_format`, falling back to `markdown`.
    pub fn output_format(&mut self) -> OutputFormat {
        let Some(resolved) = self.try_resolve(SectionKey::OutputFormat, None) else {
            return OutputFormat::default();
        };
        let raw = resolved.section.as_text().unwrap_or_default();

        match OutputFormat::from_name(raw) {
            Some(format) => format,
            None => {
                self.warn_unrecognized(&resolved.path, raw, &OutputFormat::names(), "output format");
                OutputFormat::Markdown
            }
        }
    }

    /// Resolves `browser_config`, falling back to default settings.
    pub fn browser_settings(&mut self) -> BrowserSettings {
        let Some(resolved) = self.try_resolve(SectionKey::BrowserConfig, None) else {
            return BrowserSettings::default();
        };
        let mapping = resolved.section.into_mapping().unwrap_or_default();

        self.decode(&resolved.path, mapping).unwrap_or_default()
    }

    /// Resolves `crawler_run_config` together with its markdown generator.
    pub fn crawl_run_settings(&mut self) -> CrawlRunSettings {
        let Some(resolved) = self.try_resolve(SectionKey::CrawlerRunConfig, None) else {
            return CrawlRunSettings::default();
        };
        let path = resolved.path;
        let mut mapping = resolved.section.into_mapping().unwrap_or_default();

        let generator = self
            .try_resolve(
                SectionKey::MarkdownGeneratorConfig,
                Some(&Parent {
                    path: &path,
                    mapping: &mapping,
                }),
            )
            .map(|child| {
                let child_mapping = child.section.into_mapping().unwrap_or_default();
                self.markdown_generator_from(&child.path, child_mapping)
            });
        mapping.remove(SectionKey::MarkdownGeneratorConfig.as_str());

        let raw_cache_mode = mapping.remove("cache_mode");
        let cache_mode = self.cache_mode(&path, raw_cache_mode);

        let mut settings: CrawlRunSettings = self.decode(&path, mapping).unwrap_or_default();
        settings.cache_mode = cache_mode;
        settings.markdown_generator = generator;

        if settings.markdown_generator.is_none() {
            tracing::debug!(section = %path, "No markdown generator attached");
        }

        settings
    }

    /// Resolves `markdown_generator_config`; an absent section yields defaults.
    pub fn markdown_generator(&mut self) -> MarkdownGeneratorSettings {
        match self.try_resolve(SectionKey::MarkdownGeneratorConfig, None) {
            Some(resolved) => {
                let mapping = resolved.section.into_mapping().unwrap_or_default();
                self.markdown_generator_from(&resolved.path, mapping)
            }
            None => self.markdown_generator_from(SectionKey::MarkdownGeneratorConfig.as_str(), Mapping::new()),
        }
    }

    /// Resolves the content filter selected for the top-level markdown generator.
    pub fn content_filter(&mut self) -> Option<ContentFilterSettings> {
        let generator = self
            .document
            .presence(SectionKey::MarkdownGeneratorConfig)
            .into_section()
            .and_then(Section::into_mapping);

        match generator {
            Some(mapping) => self.content_filter_in(Some(&Parent {
                path: SectionKey::MarkdownGeneratorConfig.as_str(),
                mapping: &mapping,
            })),
            None => self.content_filter_in(None),
        }
    }

    fn markdown_generator_from(&mut self, path: &str, mut mapping: Mapping) -> MarkdownGeneratorSettings {
        let filter = self.content_filter_in(Some(&Parent {
            path,
            mapping: &mapping,
        }));
        for key in CHAIN_KEYS {
            mapping.remove(key.as_str());
        }

        let mut settings: MarkdownGeneratorSettings = self.decode(path, mapping).unwrap_or_default();
        settings.content_filter = filter;
        settings
    }

    fn content_filter_in(&mut self, parent: Option<&Parent<'_>>) -> Option<ContentFilterSettings> {
        let resolved = self.try_resolve(SectionKey::ContentFilterChoice, parent)?;
        let raw = resolved.section.as_text().unwrap_or_default();

        let Some(choice) = ContentFilterChoice::from_name(raw) else {
            self.warn_unrecognized(&resolved.path, raw, &ContentFilterChoice::names(), "content filter choice");
            return None;
        };

        let key = choice.section_key();
        let Some(options) = self.try_resolve(key, parent) else {
            self.report.record(ValidationIssue::warning(
                key.as_str(),
                format!(
                    "Content filter '{}' selected but '{}' is missing or empty, no filter attached",
                    choice.as_str(),
                    key
                ),
            ));
            return None;
        };
        let mapping = options.section.into_mapping().unwrap_or_default();

        match choice {
            ContentFilterChoice::Pruning => self
                .decode::<PruningFilterSettings>(&options.path, mapping)
                .map(ContentFilterSettings::Pruning),
            ContentFilterChoice::Bm25 => self
                .decode::<Bm25FilterSettings>(&options.path, mapping)
                .map(ContentFilterSettings::Bm25),
        }
    }

    fn cache_mode(&mut self, parent_path: &str, raw: Option<Value>) -> CacheMode {
        let path = format!("{}.cache_mode", parent_path);
        match raw {
            None => CacheMode::default(),
            Some(Value::String(name)) => CacheMode::from_name(&name).unwrap_or_else(|| {
                self.warn_unrecognized(&path, &name, &CacheMode::names(), "cache mode");
                CacheMode::Enabled
            }),
            Some(other) => {
                self.report.record(ValidationIssue::warning(
                    path,
                    format!(
                        "Expected a cache mode name, found {}; using ENABLED",
                        json_type_name(&other)
                    ),
                ));
                CacheMode::Enabled
            }
        }
    }

    /// Checks `key` and logs the missing / empty / wrong-shape branches.
    fn try_resolve(&mut self, key: SectionKey, parent: Option<&Parent<'_>>) -> Option<Resolved> {
        let (path, presence) = match parent {
            Some(parent) if parent.mapping.contains_key(key.as_str()) => (
                format!("{}.{}", parent.path, key),
                presence_in(parent.mapping, key),
            ),
            _ => (key.as_str().to_string(), self.document.presence(key)),
        };

        match presence {
            Presence::Present(section) => Some(Resolved { path, section }),
            Presence::Missing => {
                tracing::debug!(section = %path, "Config section absent, using default");
                None
            }
            Presence::Empty => {
                tracing::debug!(section = %path, "Config section empty, using default");
                None
            }
            Presence::WrongShape { found } => {
                let expected = match key.shape() {
                    SectionShape::Text => "string",
                    SectionShape::Mapping => "object",
                };
                self.report.record(ValidationIssue::warning(
                    path,
                    format!("Expected a JSON {}, found {}; using default", expected, found),
                ));
                None
            }
        }
    }

    /// Decodes a mapping by field name; a type mismatch discards the section.
    fn decode<T: DeserializeOwned>(&mut self, path: &str, mapping: Mapping) -> Option<T> {
        match serde_json::from_value(Value::Object(mapping)) {
            Ok(value) => Some(value),
            Err(e) => {
                self.report.record(ValidationIssue::warning(
                    path,
                    format!("Invalid section, using default: {}", e),
                ));
                None
            }
        }
    }

    fn warn_unrecognized(&mut self, path: &str, value: &str, known: &[&str], what: &str) {
        let mut issue = ValidationIssue::warning(
            path,
            format!("Unrecognized {} '{}', expected one of: {}", what, value, known.join(", ")),
        );
        if let Some(suggestion) = did_you_mean(value, known) {
            issue = issue.with_suggestion(suggestion);
        }
        self.report.record(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ThresholdType;
    use std::path::Path;

    fn document(content: &str) -> ConfigDocument {
        ConfigDocument::parse(Path::new("config.json"), content).unwrap()
    }

    fn crawl(content: &str) -> (CrawlRunSettings, ValidationResult) {
        let doc = document(content);
        let mut report = ValidationResult::new();
        let settings = SectionBuilder::new(&doc, &mut report).crawl_run_settings();
        (settings, report)
    }

    #[test]
    fn output_format_falls_back_to_markdown() {
        for content in [
            r#"{}"#,
            r#"{"output_format": ""}"#,
            r#"{"output_format": "pdf"}"#,
            r#"{"output_format": ["html"]}"#,
        ] {
            let doc = document(content);
            let mut report = ValidationResult::new();
            assert_eq!(
                SectionBuilder::new(&doc, &mut report).output_format(),
                OutputFormat::Markdown,
                "{content}"
            );
        }
    }

    #[test]
    fn output_format_is_lower_cased() {
        let doc = document(r#"{"output_format": "References_Markdown"}"#);
        let mut report = ValidationResult::new();
        assert_eq!(
            SectionBuilder::new(&doc, &mut report).output_format(),
            OutputFormat::ReferencesMarkdown
        );
        assert_eq!(report.issue_count(), 0);
    }

    #[test]
    fn unknown_output_format_suggests_closest() {
        let doc = document(r#"{"output_format": "fit_htm"}"#);
        let mut report = ValidationResult::new();
        SectionBuilder::new(&doc, &mut report).output_format();

        let issue = &report.issues()[0];
        assert_eq!(issue.path, "output_format");
        assert_eq!(issue.suggestion.as_deref(), Some("Did you mean 'fit_html'?"));
    }

    #[test]
    fn browser_type_mismatch_discards_section() {
        let doc = document(r#"{"browser_config": {"headless": "yes", "viewport_width": 800}}"#);
        let mut report = ValidationResult::new();
        let settings = SectionBuilder::new(&doc, &mut report).browser_settings();

        assert_eq!(settings, BrowserSettings::default());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn cache_mode_decoding() {
        let (settings, _) = crawl(r#"{"crawler_run_config": {"cache_mode": "BYPASS"}}"#);
        assert_eq!(settings.cache_mode, CacheMode::Bypass);

        let (settings, report) = crawl(r#"{"crawler_run_config": {"cache_mode": "bypass"}}"#);
        assert_eq!(settings.cache_mode, CacheMode::Enabled);
        assert_eq!(report.issues()[0].path, "crawler_run_config.cache_mode");
        assert_eq!(report.issues()[0].suggestion.as_deref(), Some("Did you mean 'BYPASS'?"));

        let (settings, report) = crawl(r#"{"crawler_run_config": {"cache_mode": 2, "page_timeout": 5}}"#);
        assert_eq!(settings.cache_mode, CacheMode::Enabled);
        assert_eq!(settings.page_timeout, 5);
        assert_eq!(report.issue_count(), 1);
    }

    #[test]
    fn chain_keys_do_not_leak_into_extra() {
        let (settings, _) = crawl(
            r#"{"crawler_run_config": {
                "cache_mode": "DISABLED",
                "markdown_generator_config": {"content_filter_choice": "BM25"}
            }}"#,
        );

        assert!(settings.extra.is_empty());
        let generator = settings.markdown_generator.unwrap();
        assert!(generator.extra.is_empty());
        assert!(generator.content_filter.is_none());
    }

    #[test]
    fn nested_sections_win_over_top_level() {
        let (settings, _) = crawl(
            r#"{
                "crawler_run_config": {
                    "markdown_generator_config": {
                        "content_filter_choice": "pruning",
                        "pruning_content_filter_config": {"threshold": 0.6}
                    }
                },
                "markdown_generator_config": {"content_source": "raw_html"},
                "pruning_content_filter_config": {"threshold": 0.1}
            }"#,
        );

        let generator = settings.markdown_generator.unwrap();
        assert_eq!(generator.content_source, "cleaned_html");
        match generator.content_filter {
            Some(ContentFilterSettings::Pruning(pruning)) => assert_eq!(pruning.threshold, 0.6),
            other => panic!("expected pruning filter, got {other:?}"),
        }
    }

    #[test]
    fn top_level_sections_complete_the_chain() {
        let (settings, report) = crawl(
            r#"{
                "crawler_run_config": {"word_count_threshold": 10},
                "markdown_generator_config": {"options": {"ignore_links": true}},
                "content_filter_choice": "pruning",
                "pruning_content_filter_config": {"threshold_type": "dynamic"}
            }"#,
        );

        assert_eq!(settings.word_count_threshold, 10);
        let generator = settings.markdown_generator.unwrap();
        assert!(generator.options.ignore_links);
        match generator.content_filter {
            Some(ContentFilterSettings::Pruning(pruning)) => {
                assert_eq!(pruning.threshold_type, ThresholdType::Dynamic)
            }
            other => panic!("expected pruning filter, got {other:?}"),
        }
        assert_eq!(report.issue_count(), 0);
    }

    #[test]
    fn empty_generator_section_is_not_attached() {
        let (settings, _) = crawl(
            r#"{"crawler_run_config": {"only_text": true}, "markdown_generator_config": {}}"#,
        );
        assert!(settings.only_text);
        assert!(settings.markdown_generator.is_none());
    }

    #[test]
    fn unrecognized_filter_choice_omits_filter() {
        let doc = document(
            r#"{"content_filter_choice": "bm25", "BM25_content_filter_config": {"language": "german"}}"#,
        );
        let mut report = ValidationResult::new();
        let mut builder = SectionBuilder::new(&doc, &mut report);

        assert!(builder.content_filter().is_none());
        assert!(builder.markdown_generator().content_filter.is_none());
        assert_eq!(report.issues()[0].suggestion.as_deref(), Some("Did you mean 'BM25'?"));
    }

    #[test]
    fn standalone_generator_picks_up_top_level_filter() {
        let doc = document(
            r#"{"content_filter_choice": "BM25", "BM25_content_filter_config": {"user_query": "rust"}}"#,
        );
        let mut report = ValidationResult::new();
        let generator = SectionBuilder::new(&doc, &mut report).markdown_generator();

        match generator.content_filter {
            Some(ContentFilterSettings::Bm25(bm25)) => {
                assert_eq!(bm25.user_query.as_deref(), Some("rust"));
                assert_eq!(bm25.bm25_threshold, 1.0);
            }
            other => panic!("expected BM25 filter, got {other:?}"),
        }
    }
}

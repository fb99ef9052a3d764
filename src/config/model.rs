//! Typed configuration values produced by the section builders.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::section::SectionKey;

/// Content representation returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Markdown,
    FitMarkdown,
    RawMarkdown,
    MarkdownWithCitations,
    ReferencesMarkdown,
    Html,
    ClearedHtml,
    FitHtml,
}

impl OutputFormat {
    /// The allow-list, in documentation order.
    pub const ALL: [OutputFormat; 8] = [
        OutputFormat::Markdown,
        OutputFormat::FitMarkdown,
        OutputFormat::RawMarkdown,
        OutputFormat::MarkdownWithCitations,
        OutputFormat::ReferencesMarkdown,
        OutputFormat::Html,
        OutputFormat::ClearedHtml,
        OutputFormat::FitHtml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::FitMarkdown => "fit_markdown",
            OutputFormat::RawMarkdown => "raw_markdown",
            OutputFormat::MarkdownWithCitations => "markdown_with_citations",
            OutputFormat::ReferencesMarkdown => "references_markdown",
            OutputFormat::Html => "html",
            OutputFormat::ClearedHtml => "cleared_html",
            OutputFormat::FitHtml => "fit_html",
        }
    }

    /// Matches a value case-insensitively against the allow-list.
    pub fn from_name(value: &str) -> Option<Self> {
        let lowered = value.to_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == lowered)
    }

    /// All allow-listed names.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.as_str()).collect()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache behavior requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheMode {
    #[default]
    Enabled,
    Disabled,
    ReadOnly,
    WriteOnly,
    Bypass,
}

impl CacheMode {
    pub const ALL: [CacheMode; 5] = [
        CacheMode::Enabled,
        CacheMode::Disabled,
        CacheMode::ReadOnly,
        CacheMode::WriteOnly,
        CacheMode::Bypass,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheMode::Enabled => "ENABLED",
            CacheMode::Disabled => "DISABLED",
            CacheMode::ReadOnly => "READ_ONLY",
            CacheMode::WriteOnly => "WRITE_ONLY",
            CacheMode::Bypass => "BYPASS",
        }
    }

    /// Case-sensitive match against the member names.
    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == value)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.as_str()).collect()
    }
}

/// Which content filter the markdown generator should attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFilterChoice {
    Pruning,
    Bm25,
}

impl ContentFilterChoice {
    pub const ALL: [ContentFilterChoice; 2] = [ContentFilterChoice::Pruning, ContentFilterChoice::Bm25];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentFilterChoice::Pruning => "pruning",
            ContentFilterChoice::Bm25 => "BM25",
        }
    }

    /// Case-sensitive: `pruning` or `BM25`.
    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }

    /// Section holding the options for this filter.
    pub fn section_key(self) -> SectionKey {
        match self {
            ContentFilterChoice::Pruning => SectionKey::PruningContentFilterConfig,
            ContentFilterChoice::Bm25 => SectionKey::Bm25ContentFilterConfig,
        }
    }
}

/// Browser settings handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Browser family (chromium, firefox, webkit).
    pub browser_type: String,

    /// Run without a visible window.
    pub headless: bool,

    /// Viewport width in pixels.
    pub viewport_width: u32,

    /// Viewport height in pixels.
    pub viewport_height: u32,

    /// User agent override.
    pub user_agent: Option<String>,

    /// Proxy URL for all requests.
    pub proxy: Option<String>,

    /// Extra request headers.
    pub headers: BTreeMap<String, String>,

    /// Accept invalid TLS certificates.
    pub ignore_https_errors: bool,

    /// Execute page scripts.
    pub java_script_enabled: bool,

    /// Disable images and heavy resources.
    pub text_mode: bool,

    /// Disable background features for lower resource use.
    pub light_mode: bool,

    /// Verbose engine logging.
    pub verbose: bool,

    /// Keys not modelled here, forwarded untouched to the engine.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            browser_type: default_browser_type(),
            headless: true,
            viewport_width: 1080,
            viewport_height: 600,
            user_agent: None,
            proxy: None,
            headers: BTreeMap::new(),
            ignore_https_errors: true,
            java_script_enabled: true,
            text_mode: false,
            light_mode: false,
            verbose: true,
            extra: Map::new(),
        }
    }
}

/// Per-crawl settings handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlRunSettings {
    /// Decoded separately; unknown names fall back to `ENABLED`.
    #[serde(skip_deserializing)]
    pub cache_mode: CacheMode,

    /// Minimum words for a text block to be kept.
    pub word_count_threshold: u32,

    /// Restrict extraction to elements matching this selector.
    pub css_selector: Option<String>,

    /// Tags removed before markdown generation.
    pub excluded_tags: Vec<String>,

    /// Extract text only.
    pub only_text: bool,

    /// Page load timeout in milliseconds.
    pub page_timeout: u64,

    /// Navigation condition to wait for.
    pub wait_until: String,

    /// Capture a screenshot.
    pub screenshot: bool,

    /// Capture a PDF.
    pub pdf: bool,

    /// Honor robots.txt.
    pub check_robots_txt: bool,

    /// User agent override for this run.
    pub user_agent: Option<String>,

    /// Verbose engine logging.
    pub verbose: bool,

    /// Attached when `markdown_generator_config` resolves to a non-empty mapping.
    #[serde(skip_deserializing)]
    pub markdown_generator: Option<MarkdownGeneratorSettings>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CrawlRunSettings {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Enabled,
            word_count_threshold: 1,
            css_selector: None,
            excluded_tags: Vec::new(),
            only_text: false,
            page_timeout: default_page_timeout(),
            wait_until: default_wait_until(),
            screenshot: false,
            pdf: false,
            check_robots_txt: false,
            user_agent: None,
            verbose: true,
            markdown_generator: None,
            extra: Map::new(),
        }
    }
}

/// Markdown generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownGeneratorSettings {
    /// Which HTML the markdown is generated from (cleaned_html, raw_html, fit_html).
    pub content_source: String,

    /// Conversion options.
    pub options: MarkdownOptions,

    /// Attached when `content_filter_choice` names a filter whose section is non-empty.
    #[serde(skip_deserializing)]
    pub content_filter: Option<ContentFilterSettings>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MarkdownGeneratorSettings {
    fn default() -> Self {
        Self {
            content_source: default_content_source(),
            options: MarkdownOptions::default(),
            content_filter: None,
            extra: Map::new(),
        }
    }
}

/// HTML to markdown conversion options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    pub ignore_links: bool,
    pub ignore_images: bool,
    pub escape_html: bool,
    /// Wrap width, 0 for no wrapping.
    pub body_width: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            ignore_links: false,
            ignore_images: false,
            escape_html: true,
            body_width: 0,
            extra: Map::new(),
        }
    }
}

/// A content filter attached to the markdown generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ContentFilterSettings {
    #[serde(rename = "pruning")]
    Pruning(PruningFilterSettings),
    #[serde(rename = "BM25")]
    Bm25(Bm25FilterSettings),
}

impl ContentFilterSettings {
    pub fn choice(&self) -> ContentFilterChoice {
        match self {
            ContentFilterSettings::Pruning(_) => ContentFilterChoice::Pruning,
            ContentFilterSettings::Bm25(_) => ContentFilterChoice::Bm25,
        }
    }
}

/// Options for the pruning filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningFilterSettings {
    pub user_query: Option<String>,
    pub min_word_threshold: Option<u32>,
    pub threshold_type: ThresholdType,
    pub threshold: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PruningFilterSettings {
    fn default() -> Self {
        Self {
            user_query: None,
            min_word_threshold: None,
            threshold_type: ThresholdType::Fixed,
            threshold: 0.48,
            extra: Map::new(),
        }
    }
}

/// How the pruning threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    #[default]
    Fixed,
    Dynamic,
}

/// Options for the BM25 filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25FilterSettings {
    pub user_query: Option<String>,
    pub bm25_threshold: f64,
    pub language: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Bm25FilterSettings {
    fn default() -> Self {
        Self {
            user_query: None,
            bm25_threshold: 1.0,
            language: "english".to_string(),
            extra: Map::new(),
        }
    }
}

// Default value functions

fn default_browser_type() -> String {
    "chromium".to_string()
}

fn default_page_timeout() -> u64 {
    60_000
}

fn default_wait_until() -> String {
    "domcontentloaded".to_string()
}

fn default_content_source() -> String {
    "cleaned_html".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_matching_is_case_insensitive() {
        assert_eq!(OutputFormat::from_name("FIT_Markdown"), Some(OutputFormat::FitMarkdown));
        assert_eq!(OutputFormat::from_name("cleared_html"), Some(OutputFormat::ClearedHtml));
        assert_eq!(OutputFormat::from_name("pdf"), None);
    }

    #[test]
    fn cache_mode_matching_is_case_sensitive() {
        assert_eq!(CacheMode::from_name("DISABLED"), Some(CacheMode::Disabled));
        assert_eq!(CacheMode::from_name("READ_ONLY"), Some(CacheMode::ReadOnly));
        assert_eq!(CacheMode::from_name("disabled"), None);
    }

    #[test]
    fn filter_choice_matching_is_case_sensitive() {
        assert_eq!(ContentFilterChoice::from_name("BM25"), Some(ContentFilterChoice::Bm25));
        assert_eq!(ContentFilterChoice::from_name("bm25"), None);
        assert_eq!(
            ContentFilterChoice::Pruning.section_key(),
            SectionKey::PruningContentFilterConfig
        );
    }

    #[test]
    fn unknown_browser_keys_are_kept_for_the_engine() {
        let settings: BrowserSettings =
            serde_json::from_value(serde_json::json!({"headless": false, "channel": "beta"}))
                .unwrap();

        assert!(!settings.headless);
        assert_eq!(settings.viewport_width, 1080);
        assert_eq!(settings.extra.get("channel"), Some(&Value::from("beta")));
    }

    #[test]
    fn content_filter_serializes_with_its_type_tag() {
        let filter = ContentFilterSettings::Bm25(Bm25FilterSettings::default());
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["type"], "BM25");
        assert_eq!(json["language"], "english");
    }
}

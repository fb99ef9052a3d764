//! Crawling engine boundary.
//!
//! The service hands the engine a [`CrawlJob`] built from the current
//! configuration and picks one field out of the [`CrawlResult`] it returns.

pub mod http;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{BrowserSettings, CrawlRunSettings, OutputFormat};
use crate::error::EngineError;

pub use http::HttpEngine;

/// Boxed future returned by [`CrawlEngine::crawl`].
pub type EngineFuture = Pin<Box<dyn Future<Output = Result<CrawlResult, EngineError>> + Send>>;

/// Fetches a page and derives its content representations.
pub trait CrawlEngine: Send + Sync {
    /// Crawls `job.url` with the job's settings.
    fn crawl(&self, job: CrawlJob) -> EngineFuture;
}

/// One crawl request with the settings in force when it was made.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub url: String,
    pub browser: Arc<BrowserSettings>,
    pub run: Arc<CrawlRunSettings>,
}

/// Markdown renditions of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkdownResult {
    pub raw_markdown: String,
    pub markdown_with_citations: Option<String>,
    pub references_markdown: Option<String>,
    pub fit_markdown: Option<String>,
    pub fit_html: Option<String>,
}

/// Outcome of crawling one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlResult {
    pub success: bool,
    pub url: String,
    pub status_code: Option<u16>,
    pub html: Option<String>,
    pub cleaned_html: Option<String>,
    pub markdown: Option<MarkdownResult>,
    pub error_message: Option<String>,
}

impl CrawlResult {
    /// A failed crawl with the given message.
    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            url: url.into(),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// The representation selected by `format`, if the engine produced it.
    pub fn content_for(&self, format: OutputFormat) -> Option<&str> {
        let markdown = self.markdown.as_ref();
        match format {
            OutputFormat::Markdown | OutputFormat::RawMarkdown => {
                markdown.map(|m| m.raw_markdown.as_str())
            }
            OutputFormat::MarkdownWithCitations => {
                markdown.and_then(|m| m.markdown_with_citations.as_deref())
            }
            OutputFormat::ReferencesMarkdown => {
                markdown.and_then(|m| m.references_markdown.as_deref())
            }
            OutputFormat::FitMarkdown => markdown.and_then(|m| m.fit_markdown.as_deref()),
            OutputFormat::FitHtml => markdown.and_then(|m| m.fit_html.as_deref()),
            OutputFormat::Html => self.html.as_deref(),
            OutputFormat::ClearedHtml => self.cleaned_html.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawled() -> CrawlResult {
        CrawlResult {
            success: true,
            url: "https://example.com/".to_string(),
            status_code: Some(200),
            html: Some("<h1>Hi</h1>".to_string()),
            cleaned_html: None,
            markdown: Some(MarkdownResult {
                raw_markdown: "# Hi".to_string(),
                fit_markdown: Some("Hi".to_string()),
                ..MarkdownResult::default()
            }),
            error_message: None,
        }
    }

    #[test]
    fn selects_the_requested_representation() {
        let result = crawled();
        assert_eq!(result.content_for(OutputFormat::Markdown), Some("# Hi"));
        assert_eq!(result.content_for(OutputFormat::RawMarkdown), Some("# Hi"));
        assert_eq!(result.content_for(OutputFormat::FitMarkdown), Some("Hi"));
        assert_eq!(result.content_for(OutputFormat::Html), Some("<h1>Hi</h1>"));
    }

    #[test]
    fn missing_representations_are_none() {
        let result = crawled();
        assert_eq!(result.content_for(OutputFormat::ClearedHtml), None);
        assert_eq!(result.content_for(OutputFormat::MarkdownWithCitations), None);
        assert_eq!(CrawlResult::failed("u", "boom").content_for(OutputFormat::Markdown), None);
    }
}

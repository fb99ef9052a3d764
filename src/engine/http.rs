//! Plain HTTP crawling engine.
//!
//! Fetches the page with `reqwest` and renders markdown with `htmd`. No
//! JavaScript runs, so only `html` and `raw_markdown` are produced.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use super::{CrawlEngine, CrawlJob, CrawlResult, EngineFuture, MarkdownResult};
use crate::config::{BrowserSettings, CrawlRunSettings};
use crate::error::EngineError;

/// User agent sent when neither settings section names one.
pub const DEFAULT_USER_AGENT: &str = concat!("crawl-gateway/", env!("CARGO_PKG_VERSION"));

/// Tags never rendered into markdown.
const ALWAYS_SKIPPED: [&str; 2] = ["script", "style"];

/// Engine backed by a plain HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct HttpEngine;

impl HttpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CrawlEngine for HttpEngine {
    fn crawl(&self, job: CrawlJob) -> EngineFuture {
        Box::pin(fetch(job))
    }
}

async fn fetch(job: CrawlJob) -> Result<CrawlResult, EngineError> {
    let client = build_client(&job.browser, &job.run)?;

    debug!(url = %job.url, "Fetching page");
    let response = client
        .get(&job.url)
        .send()
        .await
        .map_err(|e| EngineError::RequestFailed {
            url: job.url.clone(),
            message: e.to_string(),
        })?;

    let status = response.status();
    let html = response
        .text()
        .await
        .map_err(|e| EngineError::RequestFailed {
            url: job.url.clone(),
            message: e.to_string(),
        })?;

    if !status.is_success() {
        warn!(url = %job.url, status = status.as_u16(), "Page returned an error status");
        return Ok(CrawlResult {
            status_code: Some(status.as_u16()),
            html: Some(html),
            ..CrawlResult::failed(job.url, format!("HTTP {}", status))
        });
    }

    let raw_markdown = render_markdown(&html, &job.run)?;
    debug!(
        url = %job.url,
        html_len = html.len(),
        markdown_len = raw_markdown.len(),
        "Page converted"
    );

    Ok(CrawlResult {
        success: true,
        url: job.url,
        status_code: Some(status.as_u16()),
        html: Some(html),
        cleaned_html: None,
        markdown: Some(MarkdownResult {
            raw_markdown,
            ..MarkdownResult::default()
        }),
        error_message: None,
    })
}

/// Builds a client for one job's settings.
fn build_client(
    browser: &BrowserSettings,
    run: &CrawlRunSettings,
) -> Result<reqwest::Client, EngineError> {
    let user_agent = run
        .user_agent
        .as_deref()
        .or(browser.user_agent.as_deref())
        .unwrap_or(DEFAULT_USER_AGENT);

    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(header_map(browser))
        .danger_accept_invalid_certs(browser.ignore_https_errors);

    if run.page_timeout > 0 {
        builder = builder.timeout(Duration::from_millis(run.page_timeout));
    }

    builder = match browser.proxy.as_deref() {
        Some(proxy) => builder.proxy(
            reqwest::Proxy::all(proxy)
                .map_err(|e| EngineError::ClientBuild(format!("invalid proxy '{}': {}", proxy, e)))?,
        ),
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| EngineError::ClientBuild(e.to_string()))
}

/// Extra request headers; entries that are not valid HTTP are skipped.
fn header_map(browser: &BrowserSettings) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &browser.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid header in browser_config.headers"),
        }
    }
    headers
}

/// Converts page HTML to markdown following the run's generator options.
fn render_markdown(html: &str, run: &CrawlRunSettings) -> Result<String, EngineError> {
    let options = run
        .markdown_generator
        .as_ref()
        .map(|generator| generator.options.clone())
        .unwrap_or_default();

    let mut skipped: Vec<&str> = ALWAYS_SKIPPED.to_vec();
    skipped.extend(run.excluded_tags.iter().map(String::as_str));
    if options.ignore_images {
        skipped.push("img");
    }

    let converter = htmd::HtmlToMarkdown::builder().skip_tags(skipped).build();
    let markdown = converter
        .convert(html)
        .map_err(|e| EngineError::Conversion(format!("htmd conversion failed: {}", e)))?;

    if options.ignore_links {
        Ok(strip_links(&markdown))
    } else {
        Ok(markdown)
    }
}

/// Fenced blocks and code spans first so their brackets are never treated as
/// links, then `[text](target "title")` with one level of parentheses in the target.
static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)(?P<code>```.*?```|`[^`\n]*`)|(?P<bang>!?)\[(?P<text>[^\[\]]*)\]\((?:[^()\s]|\([^()\s]*\))*(?:\s+"[^"]*")?\)"#,
    )
    .expect("valid regex")
});

/// Replaces `[text](target)` with `text`, leaving images and code alone.
fn strip_links(markdown: &str) -> String {
    LINK.replace_all(markdown, |caps: &Captures<'_>| {
        let keep = caps.name("code").is_some()
            || caps.name("bang").is_some_and(|bang| !bang.as_str().is_empty());
        if keep {
            caps[0].to_string()
        } else {
            caps.name("text").map_or("", |text| text.as_str()).to_string()
        }
    })
    .into_owned()
}

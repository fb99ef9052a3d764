//! Error types for the crawl gateway.

use std::path::PathBuf;
use thiserror::Error;

/// Faults met while checking or reading the configuration document.
///
/// None of these escape the configuration facade; they are logged and the
/// affected section falls back to its default.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file '{path}' does not exist")]
    NotFound { path: PathBuf },

    #[error("Config file '{path}' is not a .json file")]
    NotJson { path: PathBuf },

    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Config file '{path}' root must be a JSON object, found {found}")]
    RootNotObject { path: PathBuf, found: &'static str },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to watch '{path}': {message}")]
    WatchFailed { path: PathBuf, message: String },

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// Crawl engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request to '{url}' failed: {message}")]
    RequestFailed { url: String, message: String },

    #[error("Markdown conversion failed: {0}")]
    Conversion(String),
}

/// URL normalization errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Invalid URL format")]
    InvalidFormat,

    #[error("Only 'http' and 'https' protocols are supported")]
    UnsupportedScheme { scheme: String },
}

/// HTTP server errors.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind '{addr}': {source}")]
    BindFailed {
        addr: String,
        source: std::io::Error,
    },

    #[error("Failed to accept connection: {0}")]
    AcceptFailed(std::io::Error),

    #[error("Prometheus metrics failed: {0}")]
    Metrics(String),
}

/// Failures of a single crawl request.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// An HTTP crawl gateway driven by a hot-reloadable JSON configuration.
#[derive(Parser, Debug)]
#[command(name = "crawl-gateway", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "CONFIG_PATH", global = true)]
    pub config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands for the crawl gateway.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the crawl API, reloading the configuration on change.
    Serve(ServeArgs),

    /// Resolve every section once and report all diagnostics.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the resolved configuration.
    #[command(name = "config-show")]
    ConfigShow,

    /// Crawl one URL with the current configuration and print the response.
    Crawl {
        /// The page to crawl.
        url: String,
    },
}

/// Arguments for the serve subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8000", env = "BIND_ADDR")]
    pub bind: String,
}

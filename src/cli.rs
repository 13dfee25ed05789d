//! Command-line interface definition for the tracker binary
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for headless tracking, backup recovery, and
//! consent management.

use clap::{Parser, Subcommand};

/// Cryptique - headless analytics tracker
///
/// Track page visits against a remote collector from the command line,
/// without a browser embedding.
#[derive(Parser, Debug, Clone)]
#[command(name = "cryptique")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Site identifier (the script-tag `site-id` attribute)
    #[arg(long, env = "CRYPTIQUE_SITE_ID")]
    pub site_id: Option<String>,

    /// Override the collector endpoint from config
    #[arg(long, env = "CRYPTIQUE_API_URL")]
    pub api_url: Option<String>,

    /// Override the persistent store database path
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the tracker binary
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Track a sequence of page visits as one headless session
    Track {
        /// Page URLs to visit, in order
        #[arg(required = true)]
        pages: Vec<String>,

        /// Referrer of the first page
        #[arg(long)]
        referrer: Option<String>,

        /// User agent reported to the collector
        #[arg(long)]
        user_agent: Option<String>,

        /// Language tag reported to the collector
        #[arg(long)]
        language: Option<String>,

        /// Screen resolution reported to the collector (WIDTHxHEIGHT)
        #[arg(long)]
        resolution: Option<String>,

        /// Milliseconds to dwell between page visits
        #[arg(long, default_value_t = 1000)]
        dwell_ms: u64,

        /// Skip the geolocation lookup
        #[arg(long)]
        no_geo: bool,
    },

    /// Send a session backup left behind by a previous run
    Recover,

    /// Manage the tracking consent flag
    Consent {
        #[command(subcommand)]
        action: ConsentAction,
    },
}

/// Consent subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConsentAction {
    /// Record consent
    Grant,
    /// Withdraw consent
    Revoke,
    /// Print the current consent state
    Status,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

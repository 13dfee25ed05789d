//! Configuration management for the tracker
//!
//! This module handles loading, parsing, validating, and merging
//! configuration from a YAML file and CLI overrides.

use crate::cli::Cli;
use crate::error::{CryptiqueError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the tracker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Collector endpoint settings
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Geolocation lookup settings
    #[serde(default)]
    pub geo: GeoConfig,
}

/// Collector endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Collector ingestion endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Site identifier, the tracker's equivalent of the script-tag
    /// `site-id` attribute. Required.
    #[serde(default)]
    pub site_id: String,

    /// Timeout for collector requests (seconds)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://cryptique-backend.vercel.app/api/sdk/track".to_string()
}

fn default_send_timeout() -> u64 {
    5
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            site_id: String::new(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity window after which a stored session expires (seconds)
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,

    /// Sessions shorter than this with at most one page count as bounces
    /// (seconds)
    #[serde(default = "default_bounce_threshold")]
    pub bounce_threshold_secs: u64,

    /// Period of the snapshot tick (seconds)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

fn default_session_timeout() -> u64 {
    120
}

fn default_bounce_threshold() -> u64 {
    30
}

fn default_tick_interval() -> u64 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout(),
            bounce_threshold_secs: default_bounce_threshold(),
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl SessionConfig {
    /// Inactivity window in milliseconds, the unit of the activity clock
    pub fn timeout_millis(&self) -> i64 {
        (self.timeout_secs as i64).saturating_mul(1000)
    }

    /// Tick period as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

/// Geolocation lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// ipinfo-style JSON endpoint answering `{"country": "..."}`
    #[serde(default = "default_geo_endpoint")]
    pub endpoint: String,

    /// Timeout per lookup attempt (seconds)
    #[serde(default = "default_geo_timeout")]
    pub timeout_secs: u64,

    /// Disable to skip the lookup entirely
    #[serde(default = "default_geo_enabled")]
    pub enabled: bool,
}

fn default_geo_endpoint() -> String {
    "https://ipinfo.io/json".to_string()
}

fn default_geo_timeout() -> u64 {
    3
}

fn default_geo_enabled() -> bool {
    true
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geo_endpoint(),
            timeout_secs: default_geo_timeout(),
            enabled: default_geo_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, then apply CLI overrides
    ///
    /// A missing file is not an error: defaults apply, and the CLI can
    /// supply the rest. CLI values always win over file values.
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path);
            Self::default()
        };

        if let Some(site_id) = &cli.site_id {
            config.collector.site_id = site_id.clone();
        }
        if let Some(api_url) = &cli.api_url {
            config.collector.api_url = api_url.clone();
        }

        Ok(config)
    }

    /// Validate the configuration, rejecting unusable values early
    pub fn validate(&self) -> Result<()> {
        if self.collector.site_id.trim().is_empty() {
            return Err(CryptiqueError::Config(
                "site_id is required (set collector.site_id or pass --site-id)".to_string(),
            )
            .into());
        }
        url::Url::parse(&self.collector.api_url)
            .map_err(|e| CryptiqueError::Config(format!("invalid collector.api_url: {}", e)))?;
        url::Url::parse(&self.geo.endpoint)
            .map_err(|e| CryptiqueError::Config(format!("invalid geo.endpoint: {}", e)))?;

        if self.collector.send_timeout_secs == 0 {
            return Err(
                CryptiqueError::Config("collector.send_timeout_secs must be > 0".to_string()).into(),
            );
        }
        if self.session.timeout_secs == 0 {
            return Err(
                CryptiqueError::Config("session.timeout_secs must be > 0".to_string()).into(),
            );
        }
        if self.session.tick_interval_secs == 0 {
            return Err(
                CryptiqueError::Config("session.tick_interval_secs must be > 0".to_string()).into(),
            );
        }

        Ok(())
    }
}

//! Best-effort country lookup
//!
//! One HTTP call at startup against an ipinfo-style JSON endpoint, with a
//! bounded timeout and a single fallback retry. The tracker never waits on
//! this: the lookup runs in the background and fills in `country` when it
//! lands, or leaves "Unknown" behind.

use crate::config::GeoConfig;
use crate::error::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Country placeholder when every lookup attempt fails
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Geolocation lookup client
#[derive(Debug, Clone)]
pub struct GeoClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country: Option<String>,
}

impl GeoClient {
    /// Build a client from the geolocation section of the config
    pub fn new(config: &GeoConfig) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(&config.endpoint)?,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Resolve the caller's country code, falling back to "Unknown"
    ///
    /// The primary request gets one retry against the same endpoint; both
    /// attempts share the configured timeout. Errors are logged, never
    /// returned.
    pub async fn lookup_country(&self) -> String {
        match self.fetch().await {
            Ok(country) => country,
            Err(err) => {
                tracing::warn!("Primary geolocation lookup failed: {}", err);
                match self.fetch().await {
                    Ok(country) => country,
                    Err(backup_err) => {
                        tracing::warn!("Backup geolocation lookup failed: {}", backup_err);
                        UNKNOWN_COUNTRY.to_string()
                    }
                }
            }
        }
    }

    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let body: GeoResponse = response.json().await?;
        match body.country {
            Some(country) if !country.is_empty() => Ok(country),
            _ => Ok(UNKNOWN_COUNTRY.to_string()),
        }
    }
}

//! Event dispatch to the remote collector
//!
//! All collector traffic goes through the [`Dispatcher`]: tracked events
//! as `{payload, sessionData}`, periodic snapshots as `{sessionData}`, and
//! the final flush with its fallback chain. Delivery is best-effort
//! throughout; callers log failures and move on, and a timed-out event
//! send gets exactly one retry with a reduced payload.

use crate::config::CollectorConfig;
use crate::error::{CryptiqueError, Result};
use crate::session::types::Session;
use crate::storage::{keys, StorageScope};
use anyhow::Context;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub mod metrics;
pub mod payload;

pub use payload::{EventPayload, MinimalPayload};

use self::metrics::{record_retry, SendKind, SendTimer};

/// Timeout for the fallback attempt during the final flush
const FINAL_FLUSH_FALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP client for the collector endpoint
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    api_url: Url,
    timeout: Duration,
}

impl Dispatcher {
    /// Build a dispatcher from the collector section of the config
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            api_url: Url::parse(&config.api_url)?,
            timeout: Duration::from_secs(config.send_timeout_secs),
        })
    }

    /// Send one tracked event alongside the current session state
    ///
    /// Body shape: `{"payload": ..., "sessionData": ...}`. A timeout gets
    /// one retry carrying only the reduced payload; any other failure is
    /// returned for the caller to log.
    pub async fn send_event(&self, payload: &EventPayload, session: &Session) -> Result<()> {
        let body = json!({ "payload": payload, "sessionData": session });
        let timer = SendTimer::start(SendKind::Event);

        match self.post(&body, self.timeout).await {
            Ok(()) => {
                timer.record("ok");
                Ok(())
            }
            Err(err) if is_timeout(&err) => {
                timer.record("timeout");
                tracing::warn!("Event send timed out, retrying with reduced payload");
                record_retry(SendKind::Event);

                let retry_body = json!({ "payload": payload.minimal() });
                let retry_timer = SendTimer::start(SendKind::Event);
                match self.post(&retry_body, self.timeout).await {
                    Ok(()) => {
                        retry_timer.record("retry_ok");
                        Ok(())
                    }
                    Err(retry_err) => {
                        retry_timer.record("retry_failed");
                        Err(retry_err)
                    }
                }
            }
            Err(err) => {
                timer.record("failed");
                Err(err)
            }
        }
    }

    /// Send the periodic session snapshot, body shape `{"sessionData": ...}`
    pub async fn send_snapshot(&self, session: &Session) -> Result<()> {
        let body = json!({ "sessionData": session });
        let timer = SendTimer::start(SendKind::Snapshot);
        match self.post(&body, self.timeout).await {
            Ok(()) => {
                timer.record("ok");
                Ok(())
            }
            Err(err) => {
                timer.record("failed");
                Err(err)
            }
        }
    }

    /// Last-chance delivery at shutdown
    ///
    /// First the full snapshot, then a reduced snapshot on a short
    /// timeout. An error from both attempts means the caller should write
    /// the local backup record instead.
    pub async fn final_flush(&self, session: &Session) -> Result<()> {
        let timer = SendTimer::start(SendKind::FinalFlush);
        let full = json!({ "sessionData": session });
        match self.post(&full, self.timeout).await {
            Ok(()) => {
                timer.record("ok");
                return Ok(());
            }
            Err(err) => {
                timer.record("failed");
                tracing::warn!("Final flush failed, retrying with minimal snapshot: {}", err);
            }
        }

        let timer = SendTimer::start(SendKind::FinalFlush);
        let minimal = json!({ "sessionData": session.minimal_snapshot() });
        match self.post(&minimal, FINAL_FLUSH_FALLBACK_TIMEOUT).await {
            Ok(()) => {
                timer.record("fallback_ok");
                Ok(())
            }
            Err(err) => {
                timer.record("fallback_failed");
                Err(err)
            }
        }
    }

    /// Re-send a raw session value recovered from a previous run
    pub async fn send_recovered(&self, session_data: &Value) -> Result<()> {
        let body = json!({ "sessionData": session_data });
        let timer = SendTimer::start(SendKind::Recovery);
        match self.post(&body, self.timeout).await {
            Ok(()) => {
                timer.record("ok");
                Ok(())
            }
            Err(err) => {
                timer.record("failed");
                Err(err)
            }
        }
    }

    async fn post(&self, body: &Value, timeout: Duration) -> Result<()> {
        let response = self
            .client
            .post(self.api_url.clone())
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .context("Collector request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(CryptiqueError::Dispatch(format!(
                "Collector returned HTTP {}",
                status
            ))
            .into());
        }

        // Best-effort body parse; the collector's response carries no
        // contract beyond being JSON-ish.
        if let Ok(value) = response.json::<Value>().await {
            tracing::debug!("Collector response: {}", value);
        }

        Ok(())
    }
}

fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(reqwest::Error::is_timeout)
}

/// Flush a backed-up session left behind by a previous run
///
/// Returns true when a backup existed and was delivered; the stored record
/// is removed only after a successful send.
pub async fn recover_pending(store: &dyn StorageScope, dispatcher: &Dispatcher) -> Result<bool> {
    let Some(raw) = store.get(keys::LAST_SESSION)? else {
        return Ok(false);
    };

    let session_data: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("Discarding unreadable session backup: {}", err);
            store.remove(keys::LAST_SESSION)?;
            return Ok(false);
        }
    };

    tracing::info!("Found unsent session data from previous run, sending now");
    dispatcher.send_recovered(&session_data).await?;
    store.remove(keys::LAST_SESSION)?;
    Ok(true)
}

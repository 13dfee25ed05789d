//! Event payload assembly
//!
//! Every tracked event merges three layers into one `eventData` object:
//! the event-specific fields, the session's attribution data, and the
//! device/browser fingerprint. The reduced [`MinimalPayload`] is what goes
//! out when a full send times out.

use crate::page::PageContext;
use crate::session::types::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Full payload for one tracked event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub site_id: String,
    pub website_url: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub page_path: String,
    pub is_web3_user: bool,
    pub wallet_connected: bool,
    pub event_data: Value,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl EventPayload {
    /// Merge event fields with session and device state
    ///
    /// `extra` carries the event-specific fields and wins no conflicts:
    /// the session-derived keys are written over it so attribution cannot
    /// be spoofed by event properties.
    pub fn assemble(
        event_type: &str,
        extra: Value,
        session: &Session,
        page: &PageContext,
    ) -> Self {
        let mut event_data = match extra {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        event_data.insert("source".to_string(), json!(session.utm_data.source));
        event_data.insert("medium".to_string(), json!(session.utm_data.medium));
        event_data.insert("campaign".to_string(), json!(session.utm_data.campaign));
        event_data.insert("term".to_string(), json!(session.utm_data.term));
        event_data.insert("content".to_string(), json!(session.utm_data.content));
        event_data.insert("utm_id".to_string(), json!(session.utm_data.utm_id));
        event_data.insert("referrer".to_string(), json!(session.referrer));
        event_data.insert(
            "sessionDuration".to_string(),
            json!(Utc::now()
                .signed_duration_since(session.start_time)
                .num_milliseconds()
                .max(0)),
        );
        event_data.insert("pagesPerVisit".to_string(), json!(session.pages_viewed));
        event_data.insert("isBounce".to_string(), json!(session.is_bounce));
        event_data.insert("browser".to_string(), json!(session.browser));
        event_data.insert("os".to_string(), json!(session.device.os));
        event_data.insert("deviceType".to_string(), json!(session.device.device_type));
        event_data.insert("resolution".to_string(), json!(session.device.resolution));
        event_data.insert("language".to_string(), json!(page.language));
        event_data.insert(
            "country".to_string(),
            json!(if session.country.is_empty() {
                "Unknown"
            } else {
                session.country.as_str()
            }),
        );
        event_data.insert("pageVisits".to_string(), json!(session.page_visits));
        event_data.insert("walletConnected".to_string(), json!(session.wallet_connected));

        Self {
            site_id: session.site_id.clone(),
            website_url: page.url.to_string(),
            user_id: session.user_id.clone(),
            session_id: session.session_id.clone(),
            event_type: event_type.to_string(),
            page_path: page.path(),
            is_web3_user: session.is_web3_user,
            wallet_connected: session.wallet_connected,
            event_data: Value::Object(event_data),
            timestamp: Utc::now(),
            version: crate::SDK_VERSION.to_string(),
        }
    }

    /// Strip the payload down to the fields worth retrying with
    pub fn minimal(&self) -> MinimalPayload {
        MinimalPayload {
            site_id: self.site_id.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            event_type: self.event_type.clone(),
            page_path: self.page_path.clone(),
            timestamp: self.timestamp,
            version: self.version.clone(),
        }
    }
}

/// Reduced payload used for the timeout retry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalPayload {
    pub site_id: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub page_path: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

//! Session data model
//!
//! These types serialize in the exact shape the collector backend expects:
//! camelCase keys, RFC 3339 timestamps, epoch-millisecond activity clock.

use crate::device::{BrowserInfo, DeviceInfo};
use crate::events::CustomEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Campaign attribution parameters captured at session creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtmData {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub medium: String,
    #[serde(default)]
    pub campaign: String,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub utm_id: String,
}

/// Wallet state attached to the session, re-derived on every tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub wallet_address: String,
    pub wallet_type: String,
    pub chain_name: String,
}

/// One unique URL visited within a session
///
/// The newest visit is open-ended: `duration` is zero and `is_exit` true
/// until a later visit closes it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVisit {
    pub url: String,
    pub path: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds spent on the page, finalized when the next visit is recorded
    pub duration: u64,
    pub is_entry: bool,
    pub is_exit: bool,
    /// Custom events attached to this visit
    #[serde(rename = "_events", default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<CustomEvent>,
}

/// The session record: one bounded sequence of page visits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub site_id: String,
    pub user_id: String,
    /// First-page referrer, "direct" when none; wins for the session lifetime
    pub referrer: String,
    pub utm_data: UtmData,
    /// Path of the page currently being tracked
    pub page_path: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub pages_viewed: usize,
    /// Whole seconds since `start_time`, refreshed on every tick
    pub duration: u64,
    pub is_bounce: bool,
    pub country: String,
    pub device: DeviceInfo,
    pub browser: BrowserInfo,
    pub wallet: WalletInfo,
    pub wallet_connected: bool,
    pub is_web3_user: bool,
    pub page_visits: Vec<PageVisit>,
    /// Epoch milliseconds of the last observed activity
    pub last_activity: i64,
    pub is_first_page: bool,
}

impl Session {
    /// Whole seconds elapsed between `start_time` and `now`
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.start_time).num_seconds().max(0) as u64
    }

    /// Recompute `duration` and the bounce flag against `now`
    ///
    /// A session bounces when it is both short and shallow: elapsed time
    /// under the threshold and at most one page visited.
    pub fn refresh_engagement(&mut self, now: DateTime<Utc>, bounce_threshold_secs: u64) {
        self.duration = self.elapsed_seconds(now);
        self.pages_viewed = self.page_visits.len();
        self.is_bounce = self.duration < bounce_threshold_secs && self.pages_viewed <= 1;
    }

    /// Refresh the activity clock
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now.timestamp_millis();
    }

    /// Milliseconds since the last observed activity, saturating at zero
    pub fn idle_millis(&self, now: DateTime<Utc>) -> i64 {
        (now.timestamp_millis() - self.last_activity).max(0)
    }

    /// Close the session out for a final snapshot
    pub fn finalize(&mut self, now: DateTime<Utc>, bounce_threshold_secs: u64) {
        self.end_time = Some(now);
        self.refresh_engagement(now, bounce_threshold_secs);
    }

    /// The reduced snapshot sent when full delivery keeps failing
    pub fn minimal_snapshot(&self) -> MinimalSnapshot {
        MinimalSnapshot {
            session_id: self.session_id.clone(),
            site_id: self.site_id.clone(),
            user_id: self.user_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
            pages_viewed: self.pages_viewed,
            is_bounce: self.is_bounce,
            country: if self.country.is_empty() {
                "Unknown".to_string()
            } else {
                self.country.clone()
            },
        }
    }
}

/// Bare-bones session summary used as a last-resort flush body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalSnapshot {
    pub session_id: String,
    pub site_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: u64,
    pub pages_viewed: usize,
    pub is_bounce: bool,
    pub country: String,
}

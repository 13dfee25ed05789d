//! Session lifecycle management
//!
//! A session is a bounded sequence of page visits by one storage scope,
//! closed by a 120 second inactivity timeout. The manager owns the session
//! record behind a mutex, persists it to the short-lived scope after every
//! mutation, and keeps the persistent user identity consistent: UTM-tagged
//! landings must never mint a new user id while one exists in the
//! long-lived scope.

use crate::activity::{self, UserActivity};
use crate::config::SessionConfig;
use crate::device;
use crate::error::{CryptiqueError, Result};
use crate::events::CustomEvent;
use crate::page::PageContext;
use crate::storage::{keys, StorageScope};
use crate::wallet::WalletSnapshot;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub mod types;

pub use types::{MinimalSnapshot, PageVisit, Session, UtmData, WalletInfo};

const USER_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Owns the active session and its persistence
pub struct SessionManager {
    session_store: Arc<dyn StorageScope>,
    user_store: Arc<dyn StorageScope>,
    config: SessionConfig,
    session: Mutex<Session>,
}

impl SessionManager {
    /// Load or create the session for the given entry page
    ///
    /// An unexpired stored session (last activity within the timeout
    /// window) is reused: its activity clock is refreshed, the user id is
    /// forced back to the persistent identity, and the first-page
    /// `start_time`/`referrer`/UTM survive untouched. Anything else,
    /// including an unreadable envelope, starts a fresh session capturing
    /// referrer and UTM from the entry page.
    pub fn open(
        site_id: &str,
        page: &PageContext,
        session_store: Arc<dyn StorageScope>,
        user_store: Arc<dyn StorageScope>,
        config: SessionConfig,
    ) -> Result<Self> {
        let user_id = get_or_create_user_id(user_store.as_ref())?;
        let now = Utc::now();

        let session = match load_stored(session_store.as_ref()) {
            Some(mut stored) if stored.idle_millis(now) < config.timeout_millis() => {
                stored.touch(now);
                if stored.user_id != user_id {
                    stored.user_id = user_id.clone();
                }
                stored.is_first_page = false;
                stored.page_path = page.path();
                stored.refresh_engagement(now, config.bounce_threshold_secs);
                tracing::debug!(session_id = %stored.session_id, "Reusing unexpired session");
                stored
            }
            _ => fresh_session(site_id, &user_id, page, now),
        };

        let manager = Self {
            session_store,
            user_store,
            config,
            session: Mutex::new(session),
        };
        manager.persist()?;
        Ok(manager)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| CryptiqueError::Session("session lock poisoned".into()).into())
    }

    /// Record a visit to `page`, returning whether a new entry was appended
    ///
    /// Idempotent per URL within the session: revisiting (or refreshing) an
    /// already-recorded URL only refreshes the activity clock. A genuinely
    /// new URL closes out the previous visit's duration and exit flag.
    pub fn record_page_visit(&self, page: &PageContext) -> Result<bool> {
        let now = Utc::now();
        let mut session = self.lock()?;

        session.page_path = page.path();
        let url = page.url.to_string();

        let appended = if session.page_visits.iter().any(|visit| visit.url == url) {
            false
        } else {
            if let Some(previous) = session.page_visits.last_mut() {
                previous.is_exit = false;
                previous.duration = (now - previous.timestamp).num_seconds().max(0) as u64;
            }
            let is_entry = session.page_visits.is_empty();
            session.page_visits.push(PageVisit {
                url,
                path: page.path(),
                title: page.title.clone(),
                timestamp: now,
                duration: 0,
                is_entry,
                is_exit: true,
                events: Vec::new(),
            });
            true
        };

        session.touch(now);
        session.refresh_engagement(now, self.config.bounce_threshold_secs);
        self.persist_locked(&session)?;
        Ok(appended)
    }

    /// Refresh the activity clock and persist
    pub fn touch(&self) -> Result<()> {
        let now = Utc::now();
        let mut session = self.lock()?;
        session.touch(now);
        self.persist_locked(&session)
    }

    /// Apply one periodic tick: wallet state, duration, bounce, persistence
    ///
    /// Returns the refreshed session for transmission.
    pub fn apply_tick(&self, wallet: &WalletSnapshot) -> Result<Session> {
        let now = Utc::now();
        let mut session = self.lock()?;

        session.end_time = Some(now);
        session.refresh_engagement(now, self.config.bounce_threshold_secs);
        session.wallet = wallet.info.clone();
        session.wallet_connected = wallet.connected;
        session.is_web3_user = wallet.is_web3_user;
        session.touch(now);

        self.persist_locked(&session)?;
        Ok(session.clone())
    }

    /// Apply a wallet observation without the rest of the tick work
    pub fn apply_wallet(&self, wallet: &WalletSnapshot) -> Result<()> {
        let mut session = self.lock()?;
        session.wallet = wallet.info.clone();
        session.wallet_connected = wallet.connected;
        session.is_web3_user = wallet.is_web3_user;
        self.persist_locked(&session)
    }

    /// Close the session out and return the final snapshot
    pub fn finalize(&self) -> Result<Session> {
        let now = Utc::now();
        let mut session = self.lock()?;
        session.finalize(now, self.config.bounce_threshold_secs);
        self.persist_locked(&session)?;
        Ok(session.clone())
    }

    /// Clone the current session state
    pub fn snapshot(&self) -> Result<Session> {
        Ok(self.lock()?.clone())
    }

    /// Record the resolved country
    pub fn set_country(&self, country: &str) -> Result<()> {
        let mut session = self.lock()?;
        session.country = country.to_string();
        self.persist_locked(&session)
    }

    /// Attach a custom event to the page visit it occurred on
    ///
    /// A session with no recorded visits yet silently drops the
    /// attachment; the event still travels to the collector on its own.
    pub fn attach_event(&self, event: CustomEvent) -> Result<()> {
        let mut session = self.lock()?;
        if let Some(current) = session.page_visits.last_mut() {
            current.events.push(event);
            self.persist_locked(&session)?;
        }
        Ok(())
    }

    /// First-seen activity flags for today, updating the stored markers
    pub fn observe_activity(&self) -> UserActivity {
        match activity::observe(self.user_store.as_ref(), Utc::now().date_naive()) {
            Ok(activity) => activity,
            Err(err) => {
                tracing::warn!("Activity marker update failed: {}", err);
                UserActivity::default()
            }
        }
    }

    /// Current tracking consent, defaulting to false
    pub fn consent(&self) -> bool {
        matches!(
            self.user_store.as_ref().get(keys::CONSENT),
            Ok(Some(value)) if value == "true"
        )
    }

    /// Store the tracking consent flag
    pub fn set_consent(&self, consent: bool) -> Result<()> {
        self.user_store
            .as_ref()
            .set(keys::CONSENT, if consent { "true" } else { "false" })
    }

    fn persist(&self) -> Result<()> {
        let session = self.lock()?;
        self.persist_locked(&session)
    }

    fn persist_locked(&self, session: &Session) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        self.session_store.as_ref().set(keys::SESSION, &raw)
    }
}

/// Read the persistent user identity, minting one on first use
///
/// The identity never changes once stored, regardless of session churn.
pub fn get_or_create_user_id(store: &dyn StorageScope) -> Result<String> {
    if let Some(existing) = store.get(keys::USER_ID)? {
        return Ok(existing);
    }
    let user_id = generate_user_id();
    store.set(keys::USER_ID, &user_id)?;
    Ok(user_id)
}

fn generate_user_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| USER_ID_CHARSET[rng.random_range(0..USER_ID_CHARSET.len())] as char)
        .collect();
    format!("usr_{}", suffix)
}

fn load_stored(store: &dyn StorageScope) -> Option<Session> {
    let raw = match store.get(keys::SESSION) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!("Failed to read stored session: {}", err);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::warn!("Discarding unreadable session envelope: {}", err);
            None
        }
    }
}

fn fresh_session(
    site_id: &str,
    user_id: &str,
    page: &PageContext,
    now: DateTime<Utc>,
) -> Session {
    let fingerprint = device::classify(&page.user_agent, &page.resolution);
    let session = Session {
        session_id: Uuid::new_v4().to_string(),
        site_id: site_id.to_string(),
        user_id: user_id.to_string(),
        referrer: page.proper_referrer(),
        utm_data: page.utm(),
        page_path: page.path(),
        start_time: now,
        end_time: None,
        pages_viewed: 0,
        duration: 0,
        is_bounce: true,
        country: String::new(),
        device: fingerprint.device,
        browser: fingerprint.browser,
        wallet: WalletInfo::default(),
        wallet_connected: false,
        is_web3_user: false,
        page_visits: Vec::new(),
        last_activity: now.timestamp_millis(),
        is_first_page: true,
    };
    tracing::debug!(session_id = %session.session_id, "Created new session");
    session
}

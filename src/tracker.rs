//! Tracker facade and lifecycle
//!
//! [`Tracker`] wires the session manager, dispatcher, geolocation client,
//! and wallet seam together: startup recovery, the initial page view, the
//! 5 second snapshot tick, and the final flush at shutdown. Every remote
//! call it makes is fire-and-forget; delivery failures are logged and the
//! embedder's control flow is never disturbed.

use crate::config::Config;
use crate::dispatch::{self, Dispatcher, EventPayload};
use crate::error::Result;
use crate::events::{self, CustomEvent, ElementData, EventOptions, FunnelRecord};
use crate::geo::GeoClient;
use crate::page::PageContext;
use crate::session::{Session, SessionManager};
use crate::storage::{keys, MemoryStore, SqliteStore, StorageScope};
use crate::wallet::{self, WalletProvider};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Builder for [`Tracker`]
///
/// Storage scopes and the wallet seam are optional: the defaults are an
/// in-memory short-lived scope and a SQLite long-lived scope in the
/// platform data directory.
pub struct TrackerBuilder {
    config: Config,
    page: PageContext,
    session_store: Option<Arc<dyn StorageScope>>,
    user_store: Option<Arc<dyn StorageScope>>,
    wallet: Option<Arc<dyn WalletProvider>>,
}

impl TrackerBuilder {
    /// Use a specific short-lived scope for the session envelope
    pub fn session_store(mut self, store: Arc<dyn StorageScope>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Use a specific long-lived scope for identity and backups
    pub fn user_store(mut self, store: Arc<dyn StorageScope>) -> Self {
        self.user_store = Some(store);
        self
    }

    /// Attach a wallet provider
    pub fn wallet(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.wallet = Some(provider);
        self
    }

    /// Assemble the tracker, opening or resuming the session
    pub fn build(self) -> Result<Tracker> {
        let session_store = self
            .session_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn StorageScope>);
        let user_store = match self.user_store {
            Some(store) => store,
            None => Arc::new(SqliteStore::new()?) as Arc<dyn StorageScope>,
        };

        let sessions = SessionManager::open(
            &self.config.collector.site_id,
            &self.page,
            session_store,
            Arc::clone(&user_store),
            self.config.session.clone(),
        )?;
        let dispatcher = Dispatcher::new(&self.config.collector)?;
        let geo = if self.config.geo.enabled {
            Some(GeoClient::new(&self.config.geo)?)
        } else {
            None
        };

        Ok(Tracker {
            inner: Arc::new(TrackerInner {
                sessions,
                dispatcher,
                geo,
                wallet: self.wallet,
                user_store,
                page: RwLock::new(self.page),
            }),
            tick: Mutex::new(None),
            tick_interval: self.config.session.tick_interval(),
        })
    }
}

struct TrackerInner {
    sessions: SessionManager,
    dispatcher: Dispatcher,
    geo: Option<GeoClient>,
    wallet: Option<Arc<dyn WalletProvider>>,
    user_store: Arc<dyn StorageScope>,
    page: RwLock<PageContext>,
}

/// The tracker: one instance per embedded page lifetime
pub struct Tracker {
    inner: Arc<TrackerInner>,
    tick: Mutex<Option<JoinHandle<()>>>,
    tick_interval: std::time::Duration,
}

impl Tracker {
    /// Start building a tracker for the given entry page
    pub fn builder(config: Config, entry_page: PageContext) -> TrackerBuilder {
        TrackerBuilder {
            config,
            page: entry_page,
            session_store: None,
            user_store: None,
            wallet: None,
        }
    }

    /// Bring the tracker online
    ///
    /// Re-sends any session backup from a previous run, fires the
    /// geolocation lookup in the background, tracks the entry page view,
    /// and spawns the periodic snapshot tick.
    pub async fn start(&self) -> Result<()> {
        if let Err(err) =
            dispatch::recover_pending(self.inner.user_store.as_ref(), &self.inner.dispatcher).await
        {
            tracing::warn!("Failed to deliver previous session backup: {}", err);
        }

        if let Some(geo) = self.inner.geo.clone() {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                let country = geo.lookup_country().await;
                if let Err(err) = inner.sessions.set_country(&country) {
                    tracing::warn!("Failed to record country: {}", err);
                }
            });
        }

        self.track_page_view().await;
        self.spawn_tick();
        Ok(())
    }

    /// Navigate to a new page and track the resulting page view
    pub async fn visit(&self, page: PageContext) {
        match self.inner.page.write() {
            Ok(mut current) => *current = page,
            Err(poisoned) => *poisoned.into_inner() = page,
        }
        self.track_page_view().await;
    }

    /// Record the current page and emit a PAGEVIEW event
    pub async fn track_page_view(&self) {
        let page = self.page_snapshot();
        if let Err(err) = self.inner.sessions.record_page_visit(&page) {
            tracing::warn!("Failed to record page visit: {}", err);
        }
        let activity = self.inner.sessions.observe_activity();

        self.send_event(
            "PAGEVIEW",
            json!({
                "pageUrl": page.url.to_string(),
                "pageTitle": page.title,
                "userActivity": activity,
            }),
        )
        .await;
    }

    /// Emit an arbitrary event with free-form data
    pub async fn track(&self, event_type: &str, data: Value) {
        self.send_event(event_type, data).await;
    }

    /// Emit an ELEMENT_CLICK event for an embedder-described element
    pub async fn track_click(&self, element: ElementData) {
        let element = element.truncated();
        let data = serde_json::to_value(&element).unwrap_or_else(|_| json!({}));
        self.send_event("ELEMENT_CLICK", data).await;
    }

    /// Emit a CUSTOM_EVENT and attach it to the current page visit
    pub async fn track_custom(
        &self,
        name: &str,
        properties: Value,
        options: EventOptions,
    ) -> CustomEvent {
        let event = CustomEvent::new(name, properties, options);
        if let Err(err) = self.inner.sessions.attach_event(event.clone()) {
            tracing::warn!("Failed to attach event to page visit: {}", err);
        }
        let data = serde_json::to_value(&event).unwrap_or_else(|_| json!({}));
        self.send_event("CUSTOM_EVENT", data).await;
        event
    }

    /// Track a purchase with a monetary value
    pub async fn track_purchase(
        &self,
        transaction_id: &str,
        value: f64,
        currency: &str,
        items: Value,
    ) -> CustomEvent {
        self.track_custom(
            "purchase",
            json!({ "transactionId": transaction_id, "items": items }),
            EventOptions {
                category: Some("ecommerce".to_string()),
                kind: Some("purchase".to_string()),
                value: Some(value),
                currency: Some(currency.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Track a form submission
    pub async fn track_form(
        &self,
        form_id: &str,
        event_name: Option<&str>,
        mut properties: Value,
    ) -> CustomEvent {
        if let Some(map) = properties.as_object_mut() {
            map.insert("element".to_string(), json!(form_id));
        }
        self.track_custom(
            event_name.unwrap_or("form_submit"),
            properties,
            EventOptions {
                kind: Some("form".to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Advance a funnel and emit the corresponding step event
    pub async fn track_funnel_step(
        &self,
        funnel_id: &str,
        step: u32,
        step_name: &str,
        properties: Value,
    ) -> Result<CustomEvent> {
        let record =
            FunnelRecord::advance(self.inner.user_store.as_ref(), funnel_id, step, step_name)?;

        let mut props = match properties {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        props.insert("funnelId".to_string(), json!(funnel_id));
        props.insert("stepName".to_string(), json!(step_name));
        props.insert("stepNumber".to_string(), json!(step));
        props.insert("isFirstStep".to_string(), json!(step == 1));
        props.insert("previousSteps".to_string(), json!(record.previous_steps()));

        Ok(self
            .track_custom(
                &format!("funnel_step_{}", step),
                Value::Object(props),
                EventOptions {
                    category: Some("funnel".to_string()),
                    kind: Some("funnel_step".to_string()),
                    funnel_step: Some(step),
                    ..Default::default()
                },
            )
            .await)
    }

    /// Sticky A/B variant for a test, assigning one on first call
    pub fn test_variant(&self, test_id: &str, variants: &[&str]) -> String {
        events::sticky_variant(self.inner.user_store.as_ref(), test_id, variants)
    }

    /// Current tracking consent
    pub fn consent(&self) -> bool {
        self.inner.sessions.consent()
    }

    /// Store the tracking consent flag
    pub fn set_consent(&self, consent: bool) -> Result<()> {
        self.inner.sessions.set_consent(consent)
    }

    /// Clone the current session state
    pub fn session(&self) -> Result<Session> {
        self.inner.sessions.snapshot()
    }

    /// Stop the tick and flush the final snapshot
    ///
    /// When every delivery attempt fails the snapshot is written to the
    /// long-lived scope under `cryptique_last_session`, to be re-sent by
    /// the next run.
    pub async fn shutdown(&self) -> Result<()> {
        if let Ok(mut guard) = self.tick.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }

        let session = self.inner.sessions.finalize()?;
        match self.inner.dispatcher.final_flush(&session).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!("All delivery attempts failed, storing local backup: {}", err);
                let raw = serde_json::to_string(&session)?;
                self.inner.user_store.as_ref().set(keys::LAST_SESSION, &raw)
            }
        }
    }

    fn spawn_tick(&self) {
        let inner = Arc::clone(&self.inner);
        let period = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately; the
            // snapshot cadence starts one period after startup.
            interval.tick().await;
            loop {
                interval.tick().await;
                inner.run_tick().await;
            }
        });

        if let Ok(mut guard) = self.tick.lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }

    async fn send_event(&self, event_type: &str, extra: Value) {
        // Wallet state is re-derived on every tracked event, not just on
        // ticks, so payloads never carry a stale connection status.
        let snapshot = wallet::observe(self.inner.wallet.as_deref()).await;
        if let Err(err) = self.inner.sessions.apply_wallet(&snapshot) {
            tracing::warn!("Failed to apply wallet state: {}", err);
        }

        let page = self.page_snapshot();
        let session = match self.inner.sessions.snapshot() {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!("Failed to snapshot session for {}: {}", event_type, err);
                return;
            }
        };

        let payload = EventPayload::assemble(event_type, extra, &session, &page);
        if let Err(err) = self.inner.dispatcher.send_event(&payload, &session).await {
            tracing::warn!("Error tracking {} event: {}", event_type, err);
        }
    }

    fn page_snapshot(&self) -> PageContext {
        match self.inner.page.read() {
            Ok(page) => page.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TrackerInner {
    async fn run_tick(&self) {
        let snapshot = wallet::observe(self.wallet.as_deref()).await;
        let session = match self.sessions.apply_tick(&snapshot) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!("Tick bookkeeping failed: {}", err);
                return;
            }
        };

        if let Err(err) = self.dispatcher.send_snapshot(&session).await {
            tracing::warn!("Session snapshot send failed: {}", err);
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.tick.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

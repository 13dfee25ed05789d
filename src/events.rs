//! Custom event records, funnel progress, and A/B variant assignment
//!
//! Custom events ride the same collector endpoint as page views, wrapped in
//! a `CUSTOM_EVENT` payload, and are additionally attached to the page visit
//! they occurred on so the collector can reconstruct per-page activity.

use crate::error::Result;
use crate::storage::{keys, StorageScope};
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named event with optional value, attribution, and funnel placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub name: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Option<f64>,
    pub currency: String,
    pub metadata: Value,
    pub ab_variant: Option<String>,
    pub funnel_step: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Optional fields accepted by [`CustomEvent::new`]
///
/// Everything defaults the way the collector expects: category and type
/// fall back to "custom", currency to "USD".
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    pub category: Option<String>,
    pub kind: Option<String>,
    pub value: Option<f64>,
    pub currency: Option<String>,
    pub ab_variant: Option<String>,
    pub funnel_step: Option<u32>,
}

impl CustomEvent {
    /// Build an event record from a name, free-form properties, and options
    pub fn new(name: impl Into<String>, properties: Value, options: EventOptions) -> Self {
        Self {
            name: name.into(),
            category: options.category.unwrap_or_else(|| "custom".to_string()),
            kind: options.kind.unwrap_or_else(|| "custom".to_string()),
            value: options.value,
            currency: options.currency.unwrap_or_else(|| "USD".to_string()),
            metadata: properties,
            ab_variant: options.ab_variant,
            funnel_step: options.funnel_step,
            timestamp: Utc::now(),
        }
    }
}

/// Descriptor of a clicked element, supplied by the embedder
///
/// `inner_text` is truncated to 100 characters before leaving the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    pub inner_text: String,
    pub href: String,
    pub data_id: String,
}

impl ElementData {
    /// Clamp the captured text to the collector's 100-character limit
    pub fn truncated(mut self) -> Self {
        if self.inner_text.chars().count() > 100 {
            self.inner_text = self.inner_text.chars().take(100).collect();
        }
        self
    }
}

/// One step in a funnel progress record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub step: u32,
    pub name: String,
    pub time: DateTime<Utc>,
}

/// Per-funnel progress persisted in the long-lived scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelRecord {
    pub funnel_id: String,
    pub start_time: DateTime<Utc>,
    pub current_step: u32,
    pub steps: Vec<FunnelStep>,
}

impl FunnelRecord {
    /// Load the stored record for `funnel_id`, if any
    ///
    /// A record that fails to parse is treated as absent; funnel progress
    /// is best-effort state, not something worth failing a track call over.
    pub fn load(store: &dyn StorageScope, funnel_id: &str) -> Option<Self> {
        let raw = store.get(&keys::funnel(funnel_id)).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!("Discarding unreadable funnel record {}: {}", funnel_id, err);
                None
            }
        }
    }

    /// Advance the funnel, creating the record on the first step seen
    pub fn advance(
        store: &dyn StorageScope,
        funnel_id: &str,
        step: u32,
        step_name: &str,
    ) -> Result<Self> {
        let now = Utc::now();
        let mut record = Self::load(store, funnel_id).unwrap_or_else(|| Self {
            funnel_id: funnel_id.to_string(),
            start_time: now,
            current_step: step,
            steps: Vec::new(),
        });

        record.current_step = step;
        record.steps.push(FunnelStep {
            step,
            name: step_name.to_string(),
            time: now,
        });

        store.set(&keys::funnel(funnel_id), &serde_json::to_string(&record)?)?;
        Ok(record)
    }

    /// Step numbers seen before the most recent one
    pub fn previous_steps(&self) -> Vec<u32> {
        let len = self.steps.len().saturating_sub(1);
        self.steps[..len].iter().map(|s| s.step).collect()
    }
}

/// Return the sticky A/B variant for `test_id`, assigning one if needed
///
/// The first call picks uniformly at random from `variants` and stores the
/// choice; later calls return the stored value. Falls back to "A" when no
/// variants are offered and nothing is stored.
pub fn sticky_variant(store: &dyn StorageScope, test_id: &str, variants: &[&str]) -> String {
    let key = keys::ab_variant(test_id);

    if let Ok(Some(existing)) = store.get(&key) {
        return existing;
    }

    let variant = variants
        .choose(&mut rand::rng())
        .map(|v| (*v).to_string())
        .unwrap_or_else(|| "A".to_string());

    if let Err(err) = store.set(&key, &variant) {
        tracing::warn!("Failed to persist A/B variant for {}: {}", test_id, err);
    }

    variant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_custom_event_defaults() {
        let event = CustomEvent::new("signup", json!({"plan": "pro"}), EventOptions::default());
        assert_eq!(event.category, "custom");
        assert_eq!(event.kind, "custom");
        assert_eq!(event.currency, "USD");
        assert_eq!(event.value, None);
        assert_eq!(event.metadata["plan"], "pro");
    }

    #[test]
    fn test_custom_event_serializes_type_key() {
        let event = CustomEvent::new(
            "purchase",
            json!({}),
            EventOptions {
                category: Some("ecommerce".to_string()),
                kind: Some("purchase".to_string()),
                value: Some(49.99),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "purchase");
        assert_eq!(json["category"], "ecommerce");
        assert_eq!(json["value"], 49.99);
        assert_eq!(json["abVariant"], Value::Null);
    }

    #[test]
    fn test_element_data_truncates_inner_text() {
        let element = ElementData {
            tag_name: "button".to_string(),
            inner_text: "x".repeat(250),
            ..Default::default()
        }
        .truncated();
        assert_eq!(element.inner_text.len(), 100);
    }

    #[test]
    fn test_funnel_first_step_creates_record() {
        let store = MemoryStore::new();
        let record = FunnelRecord::advance(&store, "signup", 1, "Landing").unwrap();
        assert_eq!(record.current_step, 1);
        assert_eq!(record.steps.len(), 1);
        assert!(record.previous_steps().is_empty());
    }

    #[test]
    fn test_funnel_advancing_appends_steps() {
        let store = MemoryStore::new();
        FunnelRecord::advance(&store, "signup", 1, "Landing").unwrap();
        FunnelRecord::advance(&store, "signup", 2, "Form").unwrap();
        let record = FunnelRecord::advance(&store, "signup", 3, "Done").unwrap();

        assert_eq!(record.current_step, 3);
        assert_eq!(record.steps.len(), 3);
        assert_eq!(record.previous_steps(), vec![1, 2]);
    }

    #[test]
    fn test_funnel_start_time_is_preserved() {
        let store = MemoryStore::new();
        let first = FunnelRecord::advance(&store, "f", 1, "a").unwrap();
        let second = FunnelRecord::advance(&store, "f", 2, "b").unwrap();
        assert_eq!(first.start_time, second.start_time);
    }

    #[test]
    fn test_funnel_corrupt_record_is_discarded() {
        let store = MemoryStore::new();
        store.set("cryptique_funnel_bad", "not json").unwrap();
        assert!(FunnelRecord::load(&store, "bad").is_none());
    }

    #[test]
    fn test_sticky_variant_is_stable() {
        let store = MemoryStore::new();
        let first = sticky_variant(&store, "cta", &["A", "B"]);
        for _ in 0..10 {
            assert_eq!(sticky_variant(&store, "cta", &["A", "B"]), first);
        }
    }

    #[test]
    fn test_sticky_variant_comes_from_offered_set() {
        let store = MemoryStore::new();
        let variant = sticky_variant(&store, "hero", &["red", "blue", "green"]);
        assert!(["red", "blue", "green"].contains(&variant.as_str()));
    }

    #[test]
    fn test_sticky_variant_defaults_to_a_without_variants() {
        let store = MemoryStore::new();
        assert_eq!(sticky_variant(&store, "empty", &[]), "A");
    }
}

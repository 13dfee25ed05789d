//! Daily/weekly/monthly activity markers
//!
//! The collector counts active users from first-seen flags carried inside
//! PAGEVIEW events. A marker fires at most once per calendar period per
//! storage scope; the last-seen period is kept in the long-lived scope.

use crate::error::Result;
use crate::storage::{keys, StorageScope};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// First-seen flags for the current day, ISO week, and month
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub dau: bool,
    pub wau: bool,
    pub mau: bool,
}

/// Compare `date` against the stored markers, updating them as a side effect
///
/// Each flag is true exactly once per period: the first observation writes
/// the new marker and reports true, later observations in the same period
/// report false.
pub fn observe(store: &dyn StorageScope, date: NaiveDate) -> Result<UserActivity> {
    Ok(UserActivity {
        dau: mark(store, keys::LAST_ACTIVE_DATE, &date.to_string())?,
        wau: mark(store, keys::LAST_ACTIVE_WEEK, &iso_week_label(date))?,
        mau: mark(store, keys::LAST_ACTIVE_MONTH, &month_label(date))?,
    })
}

fn mark(store: &dyn StorageScope, key: &str, current: &str) -> Result<bool> {
    let previous = store.get(key)?;
    if previous.as_deref() == Some(current) {
        return Ok(false);
    }
    store.set(key, current)?;
    Ok(true)
}

/// ISO week label, e.g. `2026-W32`
fn iso_week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{}", iso.year(), iso.week())
}

/// Year-qualified month label, e.g. `2026-08`
fn month_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_observation_fires_all_flags() {
        let store = MemoryStore::new();
        let activity = observe(&store, date(2026, 8, 6)).unwrap();
        assert!(activity.dau);
        assert!(activity.wau);
        assert!(activity.mau);
    }

    #[test]
    fn test_same_day_fires_nothing() {
        let store = MemoryStore::new();
        observe(&store, date(2026, 8, 6)).unwrap();
        let again = observe(&store, date(2026, 8, 6)).unwrap();
        assert_eq!(again, UserActivity::default());
    }

    #[test]
    fn test_next_day_same_week_fires_dau_only() {
        let store = MemoryStore::new();
        observe(&store, date(2026, 8, 4)).unwrap();
        let next = observe(&store, date(2026, 8, 5)).unwrap();
        assert!(next.dau);
        assert!(!next.wau);
        assert!(!next.mau);
    }

    #[test]
    fn test_next_week_same_month_fires_dau_and_wau() {
        let store = MemoryStore::new();
        observe(&store, date(2026, 8, 4)).unwrap();
        let next = observe(&store, date(2026, 8, 11)).unwrap();
        assert!(next.dau);
        assert!(next.wau);
        assert!(!next.mau);
    }

    #[test]
    fn test_new_month_fires_everything() {
        let store = MemoryStore::new();
        observe(&store, date(2026, 8, 31)).unwrap();
        let next = observe(&store, date(2026, 9, 14)).unwrap();
        assert!(next.dau);
        assert!(next.wau);
        assert!(next.mau);
    }

    #[test]
    fn test_iso_week_label_crosses_year_boundary() {
        // 2024-12-30 belongs to ISO week 1 of 2025.
        assert_eq!(iso_week_label(date(2024, 12, 30)), "2025-W1");
        assert_eq!(iso_week_label(date(2026, 8, 6)), "2026-W32");
    }

    #[test]
    fn test_same_month_different_year_fires_mau() {
        let store = MemoryStore::new();
        observe(&store, date(2025, 8, 6)).unwrap();
        let next = observe(&store, date(2026, 8, 6)).unwrap();
        assert!(next.mau);
    }
}

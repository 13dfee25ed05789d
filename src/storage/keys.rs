//! Storage keys understood by the collector backend
//!
//! These names are part of the external contract and must not change.

/// Persistent user identity (long-lived scope)
pub const USER_ID: &str = "mtm_user_id";

/// Tracking consent flag, "true"/"false" (long-lived scope)
pub const CONSENT: &str = "mtm_consent";

/// Active session envelope (short-lived scope)
pub const SESSION: &str = "cryptique_session";

/// Unsent final snapshot from a previous run (long-lived scope)
pub const LAST_SESSION: &str = "cryptique_last_session";

/// Activity markers (long-lived scope)
pub const LAST_ACTIVE_DATE: &str = "lastActiveDate";
pub const LAST_ACTIVE_WEEK: &str = "lastActiveWeek";
pub const LAST_ACTIVE_MONTH: &str = "lastActiveMonth";

/// Per-funnel progress records: `cryptique_funnel_<funnel_id>`
pub const FUNNEL_PREFIX: &str = "cryptique_funnel_";

/// Sticky A/B variant assignments: `cryptique_ab_<test_id>`
pub const AB_PREFIX: &str = "cryptique_ab_";

/// Key for a funnel progress record
pub fn funnel(funnel_id: &str) -> String {
    format!("{FUNNEL_PREFIX}{funnel_id}")
}

/// Key for a sticky A/B variant
pub fn ab_variant(test_id: &str) -> String {
    format!("{AB_PREFIX}{test_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funnel_key_includes_id() {
        assert_eq!(funnel("signup"), "cryptique_funnel_signup");
    }

    #[test]
    fn test_ab_key_includes_id() {
        assert_eq!(ab_variant("cta-color"), "cryptique_ab_cta-color");
    }
}

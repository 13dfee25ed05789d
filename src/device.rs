//! Device and browser classification from the user agent string

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Browser identification included in session and event payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserInfo {
    pub name: String,
    pub version: String,
}

/// Device identification included in session and event payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: String,
    pub os: String,
    pub resolution: String,
}

/// Combined fingerprint derived from a user agent string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fingerprint {
    pub browser: BrowserInfo,
    pub device: DeviceInfo,
}

fn mobile_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Mobi|Android").expect("valid regex"))
}

fn tablet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Tablet|iPad").expect("valid regex"))
}

/// Classify a user agent into a device/browser fingerprint
///
/// Unknown agents degrade to `desktop` / `Unknown` rather than failing,
/// matching the placeholder posture of the rest of the tracker.
pub fn classify(user_agent: &str, resolution: &str) -> Fingerprint {
    let device_type = if mobile_re().is_match(user_agent) {
        "mobile"
    } else if tablet_re().is_match(user_agent) {
        "tablet"
    } else {
        "desktop"
    };

    Fingerprint {
        browser: browser_info(user_agent),
        device: DeviceInfo {
            device_type: device_type.to_string(),
            os: os_name(user_agent).to_string(),
            resolution: resolution.to_string(),
        },
    }
}

fn browser_info(user_agent: &str) -> BrowserInfo {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        // Order matters: Chromium-family agents also advertise Chrome and
        // Safari tokens, so the more specific brands are matched first.
        vec![
            ("Edge", Regex::new(r"Edg(?:e|A|iOS)?/([\d.]+)").expect("valid regex")),
            ("Opera", Regex::new(r"OPR/([\d.]+)").expect("valid regex")),
            ("Firefox", Regex::new(r"Firefox/([\d.]+)").expect("valid regex")),
            ("Chrome", Regex::new(r"Chrome/([\d.]+)").expect("valid regex")),
            ("Safari", Regex::new(r"Version/([\d.]+).*Safari").expect("valid regex")),
        ]
    });

    for (name, re) in patterns {
        if let Some(caps) = re.captures(user_agent) {
            return BrowserInfo {
                name: (*name).to_string(),
                version: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            };
        }
    }

    BrowserInfo {
        name: "Unknown".to_string(),
        version: String::new(),
    }
}

fn os_name(user_agent: &str) -> &'static str {
    // Android agents also contain "Linux", so check Android first.
    if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("iPhone") || user_agent.contains("iPad") || user_agent.contains("iPod") {
        "iOS"
    } else if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS X") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "Unknown"
    }
}

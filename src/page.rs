//! Page context supplied by the embedder
//!
//! The tracker is headless: it never touches a DOM. Everything a browser
//! embedding would read from its environment (location, title, referrer,
//! language, user agent, screen size) arrives through a [`PageContext`]
//! built by the embedding application.

use crate::error::Result;
use crate::session::types::UtmData;
use url::Url;

/// A snapshot of the page being tracked
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Full page URL, including query string
    pub url: Url,
    /// Document title
    pub title: String,
    /// Raw referrer, empty when the visit is direct
    pub referrer: String,
    /// BCP 47 language tag reported by the embedder
    pub language: String,
    /// User agent string used for device classification
    pub user_agent: String,
    /// Screen resolution as `WIDTHxHEIGHT`
    pub resolution: String,
}

impl PageContext {
    /// Build a context for the given URL with empty ancillary fields
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            title: String::new(),
            referrer: String::new(),
            language: String::new(),
            user_agent: String::new(),
            resolution: String::new(),
        })
    }

    /// Set the document title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the raw referrer
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    /// Set the reported language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the screen resolution (`WIDTHxHEIGHT`)
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    /// Path plus query string, the collector's page path format
    pub fn path(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// The referrer recorded for a new session, "direct" when empty
    pub fn proper_referrer(&self) -> String {
        if self.referrer.is_empty() {
            "direct".to_string()
        } else {
            self.referrer.clone()
        }
    }

    /// Extract campaign attribution parameters from the query string
    ///
    /// Missing parameters come back as empty strings so the collector
    /// always sees the full set of keys.
    pub fn utm(&self) -> UtmData {
        let mut utm = UtmData::default();
        for (key, value) in self.url.query_pairs() {
            match key.as_ref() {
                "utm_source" => utm.source = value.into_owned(),
                "utm_medium" => utm.medium = value.into_owned(),
                "utm_campaign" => utm.campaign = value.into_owned(),
                "utm_term" => utm.term = value.into_owned(),
                "utm_content" => utm.content = value.into_owned(),
                "utm_id" => utm.utm_id = value.into_owned(),
                _ => {}
            }
        }
        utm
    }
}

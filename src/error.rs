//! Error types for the Cryptique tracker
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for tracker operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, session bookkeeping, storage access, and
/// collector dispatch. Remote failures are normally caught and logged
/// at the call site rather than propagated; these variants exist for
/// the places where a caller genuinely needs to branch on the cause.
#[derive(Error, Debug)]
pub enum CryptiqueError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session lifecycle errors (corrupt envelope, missing state)
    #[error("Session error: {0}")]
    Session(String),

    /// Storage scope errors (key-value reads and writes)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Collector dispatch errors (payload assembly, transport)
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Geolocation lookup errors
    #[error("Geolocation error: {0}")]
    Geo(String),

    /// Wallet provider errors (account or chain queries)
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for tracker operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = CryptiqueError::Config("missing site_id".to_string());
        assert_eq!(error.to_string(), "Configuration error: missing site_id");
    }

    #[test]
    fn test_session_error_display() {
        let error = CryptiqueError::Session("corrupt envelope".to_string());
        assert_eq!(error.to_string(), "Session error: corrupt envelope");
    }

    #[test]
    fn test_storage_error_display() {
        let error = CryptiqueError::Storage("database locked".to_string());
        assert_eq!(error.to_string(), "Storage error: database locked");
    }

    #[test]
    fn test_dispatch_error_display() {
        let error = CryptiqueError::Dispatch("collector unreachable".to_string());
        assert_eq!(error.to_string(), "Dispatch error: collector unreachable");
    }

    #[test]
    fn test_geo_error_display() {
        let error = CryptiqueError::Geo("lookup timed out".to_string());
        assert_eq!(error.to_string(), "Geolocation error: lookup timed out");
    }

    #[test]
    fn test_wallet_error_display() {
        let error = CryptiqueError::Wallet("provider disconnected".to_string());
        assert_eq!(error.to_string(), "Wallet error: provider disconnected");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: CryptiqueError = io_error.into();
        assert!(matches!(error, CryptiqueError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_str = "{invalid json}";
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let error: CryptiqueError = json_error.into();
        assert!(matches!(error, CryptiqueError::Serialization(_)));
    }

    #[test]
    fn test_url_error_conversion() {
        let url_error = url::Url::parse("not a url").unwrap_err();
        let error: CryptiqueError = url_error.into();
        assert!(matches!(error, CryptiqueError::Url(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CryptiqueError>();
    }
}

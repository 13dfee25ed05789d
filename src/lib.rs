//! Cryptique - headless web3-aware analytics tracker
//!
//! This library provides the Cryptique tracker core as an embeddable Rust
//! SDK: session lifecycle with an inactivity timeout, unique-URL page
//! visit recording, bounce detection, and best-effort event dispatch to a
//! remote collector.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Session lifecycle, page visits, and the persisted data model
//! - `dispatch`: Collector payload assembly and best-effort HTTP delivery
//! - `tracker`: The facade wiring session, dispatch, geo, and wallet together
//! - `storage`: Short-lived and long-lived key-value scopes
//! - `events`: Custom events, funnel progress, A/B variant assignment
//! - `wallet`: Wallet provider seam and wallet state derivation
//! - `geo`: Best-effort country lookup
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use cryptique::{Config, PageContext, Tracker};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.collector.site_id = "my-site".to_string();
//!     config.validate()?;
//!
//!     let page = PageContext::new("https://example.com/?utm_source=launch")?
//!         .with_title("Home");
//!     let tracker = Tracker::builder(config, page).build()?;
//!
//!     tracker.start().await?;
//!     tracker.track_custom("signup", serde_json::json!({"plan": "pro"}), Default::default()).await;
//!     tracker.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod cli;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod geo;
pub mod page;
pub mod session;
pub mod storage;
pub mod tracker;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{CryptiqueError, Result};
pub use events::{CustomEvent, ElementData, EventOptions};
pub use page::PageContext;
pub use session::{PageVisit, Session, SessionManager, UtmData};
pub use tracker::{Tracker, TrackerBuilder};
pub use wallet::WalletProvider;

/// Version string reported in every collector payload
pub const SDK_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

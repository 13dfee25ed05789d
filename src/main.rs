//! Cryptique - headless analytics tracker CLI
//!
//! Drives the tracker library from the command line: visit a sequence of
//! pages as one session, flush a stranded backup, or manage consent.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cryptique::cli::{Cli, Commands, ConsentAction};
use cryptique::config::Config;
use cryptique::dispatch::{self, Dispatcher};
use cryptique::page::PageContext;
use cryptique::storage::{keys, SqliteStore, StorageScope};
use cryptique::tracker::Tracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let cli = Cli::parse_args();

    // If the user supplied a storage path on the CLI, mirror it into
    // CRYPTIQUE_STORE_DB so the store initializer can pick it up.
    if let Some(db_path) = &cli.storage_path {
        std::env::set_var("CRYPTIQUE_STORE_DB", db_path);
        tracing::info!("Using storage DB override from CLI: {}", db_path);
    }

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(|| "config/config.yaml".to_string());
    let mut config = Config::load(&config_path, &cli)?;

    match cli.command {
        Commands::Track {
            pages,
            referrer,
            user_agent,
            language,
            resolution,
            dwell_ms,
            no_geo,
        } => {
            if no_geo {
                config.geo.enabled = false;
            }
            config.validate()?;

            tracing::info!("Starting headless tracking session ({} pages)", pages.len());
            run_track(
                config, pages, referrer, user_agent, language, resolution, dwell_ms,
            )
            .await
        }
        Commands::Recover => {
            tracing::info!("Checking for a stranded session backup");
            config.validate()?;

            let store = SqliteStore::new()?;
            let dispatcher = Dispatcher::new(&config.collector)?;
            if dispatch::recover_pending(&store, &dispatcher).await? {
                println!("Recovered session backup sent to collector");
            } else {
                println!("No session backup pending");
            }
            Ok(())
        }
        Commands::Consent { action } => {
            let store = SqliteStore::new()?;
            match action {
                ConsentAction::Grant => {
                    store.set(keys::CONSENT, "true")?;
                    println!("Tracking consent granted");
                }
                ConsentAction::Revoke => {
                    store.set(keys::CONSENT, "false")?;
                    println!("Tracking consent revoked");
                }
                ConsentAction::Status => {
                    let consent = matches!(store.get(keys::CONSENT)?.as_deref(), Some("true"));
                    println!("Tracking consent: {}", if consent { "granted" } else { "not granted" });
                }
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_track(
    config: Config,
    pages: Vec<String>,
    referrer: Option<String>,
    user_agent: Option<String>,
    language: Option<String>,
    resolution: Option<String>,
    dwell_ms: u64,
) -> Result<()> {
    let user_store: Arc<dyn StorageScope> = Arc::new(SqliteStore::new()?);

    if !matches!(user_store.get(keys::CONSENT)?.as_deref(), Some("true")) {
        tracing::warn!("No tracking consent recorded; run `cryptique consent grant` first");
    }

    let mut iter = pages.into_iter();
    let Some(first) = iter.next() else {
        return Ok(());
    };

    let mut entry = PageContext::new(&first)?;
    if let Some(referrer) = referrer {
        entry = entry.with_referrer(referrer);
    }
    if let Some(user_agent) = user_agent {
        entry = entry.with_user_agent(user_agent);
    }
    if let Some(language) = language {
        entry = entry.with_language(language);
    }
    if let Some(resolution) = resolution {
        entry = entry.with_resolution(resolution);
    }

    let tracker = Tracker::builder(config, entry.clone())
        .user_store(user_store)
        .build()?;
    tracker.start().await?;

    for url in iter {
        tokio::time::sleep(Duration::from_millis(dwell_ms)).await;
        let page = entry.clone();
        let page = match PageContext::new(&url) {
            Ok(next) => next
                .with_referrer(page.referrer)
                .with_user_agent(page.user_agent)
                .with_language(page.language)
                .with_resolution(page.resolution),
            Err(err) => {
                tracing::warn!("Skipping invalid page URL {}: {}", url, err);
                continue;
            }
        };
        tracker.visit(page).await;
    }

    tracker.shutdown().await?;

    let session = tracker.session()?;
    println!(
        "Session {} closed: {} page(s), {}s, bounce={}",
        session.session_id, session.pages_viewed, session.duration, session.is_bounce
    );
    Ok(())
}

/// Initialize tracing subscriber with environment filter
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cryptique=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

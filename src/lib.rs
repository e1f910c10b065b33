// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod ad;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod highlight;
pub mod listing;
pub mod notify;
pub mod scheduler;
pub mod telemetry;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::ad::{Ad, PhotoSize};
pub use crate::config::WatchConfig;
pub use crate::dispatch::{CycleReport, DispatchSettings, Dispatcher};
pub use crate::error::{Result, WatchError};
pub use crate::highlight::HighlightEngine;

use std::sync::Arc;

use crate::listing::olx::OlxListingSource;
use crate::notify::TelegramNotifier;

/// Wire the production collaborators (OLX listing, Telegram, configured
/// watermark store) around an already-validated config and rule set.
pub async fn build_dispatcher(cfg: &WatchConfig, engine: HighlightEngine) -> Result<Dispatcher> {
    let source = OlxListingSource::new(&cfg.city, &cfg.query_params)?;
    if let Some(url) = source.query_url() {
        tracing::info!(%url, poll_interval_secs = cfg.poll_interval.as_secs(), "watching listing");
    }
    let store = cfg.open_store().await?;
    let notifier = TelegramNotifier::new(cfg.bot_api_key.clone(), cfg.chat_id.clone());

    Ok(Dispatcher::new(
        DispatchSettings::from_config(cfg),
        engine,
        Arc::new(source),
        store,
        Arc::new(notifier),
    ))
}

//! # Dispatch driver
//! One poll cycle: read the watermark, walk the listing, deliver new ads
//! oldest-first and advance the watermark after every confirmed send.
//!
//! A failure mid-delivery leaves the watermark at the last confirmed ad, so
//! the next cycle re-announces only what was never sent.

use chrono::{DateTime, FixedOffset};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::ad::PhotoSize;
use crate::config::WatchConfig;
use crate::error::Result;
use crate::highlight::HighlightEngine;
use crate::listing::{collect_new_ads, ListingSource};
use crate::notify::{Delivery, Notifier, NotifyError};
use crate::telemetry;
use crate::watermark::{watermark_key, Watermark, WatermarkStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Delivering,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub watermark_key: String,
    pub rate_limit_backoff: Duration,
    pub photo_size: PhotoSize,
}

impl DispatchSettings {
    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self {
            watermark_key: watermark_key(&cfg.city, &cfg.chat_id, &cfg.query_params),
            rate_limit_backoff: cfg.rate_limit_backoff,
            photo_size: cfg.photo_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub found: usize,
    pub delivered: usize,
    pub watermark: DateTime<FixedOffset>,
}

pub struct Dispatcher {
    source: Arc<dyn ListingSource>,
    engine: HighlightEngine,
    store: Arc<dyn WatermarkStore>,
    notifier: Arc<dyn Notifier>,
    settings: DispatchSettings,
    state: CycleState,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        engine: HighlightEngine,
        source: Arc<dyn ListingSource>,
        store: Arc<dyn WatermarkStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            engine,
            store,
            notifier,
            settings,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    fn enter(&mut self, next: CycleState) {
        tracing::trace!(target: "dispatch", from = ?self.state, to = ?next, "cycle state");
        self.state = next;
    }

    /// Run one cycle; the driver is back in `Idle` whatever the outcome.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        telemetry::ensure_metrics_described();
        let res = self.cycle().await;
        self.enter(CycleState::Idle);
        if res.is_err() {
            counter!("dispatch_cycle_errors_total").increment(1);
        }
        res
    }

    async fn cycle(&mut self) -> Result<CycleReport> {
        self.enter(CycleState::Fetching);
        let mut watermark = Watermark::load(self.store.as_ref(), &self.settings.watermark_key).await?;

        info!(
            target: "dispatch",
            source = self.source.name(),
            watermark = %watermark.current().to_rfc3339(),
            "starting search for new ads"
        );
        let fetch_start = Instant::now();
        let walk = collect_new_ads(
            self.source.as_ref(),
            &self.engine,
            watermark.current(),
            self.settings.photo_size,
        )
        .await?;
        let found = walk.ads.len();
        info!(
            target: "dispatch",
            found,
            pages = walk.pages_fetched,
            skipped_promoted = walk.skipped_promoted,
            elapsed_ms = fetch_start.elapsed().as_millis() as u64,
            "listing walked"
        );

        self.enter(CycleState::Delivering);
        let send_start = Instant::now();
        let mut delivered = 0usize;
        for ad in &walk.into_delivery_order() {
            let delivery = Delivery::for_ad(ad);
            self.deliver_with_backoff(&delivery).await?;
            delivered += 1;
            counter!("dispatch_delivered_total").increment(1);

            if watermark.advance(self.store.as_ref(), ad.refreshed).await? {
                gauge!("dispatch_watermark_ts").set(ad.refreshed.timestamp() as f64);
            }
        }
        info!(
            target: "dispatch",
            delivered,
            channel = self.notifier.channel_name(),
            elapsed_ms = send_start.elapsed().as_millis() as u64,
            "new ads sent"
        );

        Ok(CycleReport {
            found,
            delivered,
            watermark: watermark.current(),
        })
    }

    /// A rate limit gets one retry after the fixed backoff; anything else
    /// (including a second rate limit) fails the cycle.
    async fn deliver_with_backoff(&self, delivery: &Delivery) -> Result<()> {
        match self.notifier.deliver(delivery).await {
            Ok(()) => Ok(()),
            Err(NotifyError::RateLimited { retry_after_secs }) => {
                counter!("dispatch_rate_limited_total").increment(1);
                warn!(
                    target: "dispatch",
                    kind = delivery.kind(),
                    retry_after_secs,
                    backoff_secs = self.settings.rate_limit_backoff.as_secs(),
                    "rate limited, backing off once"
                );
                tokio::time::sleep(self.settings.rate_limit_backoff).await;
                self.notifier.deliver(delivery).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

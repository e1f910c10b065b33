//! Dry run: walks the configured listing once and prints what a cycle would
//! announce, oldest first. Nothing is delivered and no watermark is written.
//!
//! Reads `CITY`, `QUERY_PARAMS`, `PHOTO_SIZE` and the highlight rules like the
//! main binary. `PROBE_SINCE` (RFC 3339) sets the watermark; default is one
//! hour ago.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, Utc};
use olx_watcher::highlight::config::load_engine_default;
use olx_watcher::listing::{collect_new_ads, olx::OlxListingSource};
use olx_watcher::notify::Delivery;
use olx_watcher::{telemetry, PhotoSize};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let city = std::env::var("CITY").map_err(|_| anyhow!("CITY is required"))?;
    let query_params = std::env::var("QUERY_PARAMS").unwrap_or_default();
    let photo_size = match std::env::var("PHOTO_SIZE") {
        Ok(v) => PhotoSize::parse(&v).ok_or_else(|| anyhow!("bad PHOTO_SIZE {v:?}"))?,
        Err(_) => PhotoSize::default(),
    };
    let since = match std::env::var("PROBE_SINCE") {
        Ok(v) => DateTime::parse_from_rfc3339(&v).context("PROBE_SINCE")?,
        Err(_) => (Utc::now() - Duration::hours(1)).fixed_offset(),
    };

    let engine = load_engine_default()?;
    let source = OlxListingSource::new(&city, &query_params)?;
    let walk = collect_new_ads(&source, &engine, since, photo_size).await?;
    let pages_fetched = walk.pages_fetched;
    let ads = walk.into_delivery_order();

    for ad in &ads {
        let delivery = Delivery::for_ad(ad);
        println!("--- [{}{}]", delivery.kind(), if ad.promoted { ", promoted" } else { "" });
        println!("{ad}");
    }

    println!(
        "probe done: {} new ad(s) since {} across {} page(s)",
        ads.len(),
        since.to_rfc3339(),
        pages_fetched
    );
    Ok(())
}

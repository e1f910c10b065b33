//! Incremental discovery over a newest-first listing.
//!
//! Organic ads are ordered by refresh time, so the first organic ad at or
//! below the watermark proves nothing after it is new and ends the walk.
//! Promoted ads can sit anywhere with any refresh time; old ones are skipped
//! without stopping.

use chrono::{DateTime, FixedOffset};
use metrics::counter;
use tracing::debug;

use super::ListingSource;
use crate::ad::{Ad, PhotoSize};
use crate::error::Result;
use crate::highlight::HighlightEngine;

#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Candidates newer than the watermark, newest first.
    pub ads: Vec<Ad>,
    pub pages_fetched: u32,
    pub skipped_promoted: usize,
}

impl WalkOutcome {
    /// Candidates oldest-refresh-first. Listing order breaks ties, older
    /// positions first, so equal timestamps keep their relative order.
    pub fn into_delivery_order(self) -> Vec<Ad> {
        let mut ads = self.ads;
        ads.reverse();
        ads.sort_by_key(|ad| ad.refreshed);
        ads
    }
}

pub async fn collect_new_ads(
    source: &dyn ListingSource,
    engine: &HighlightEngine,
    watermark: DateTime<FixedOffset>,
    photo_size: PhotoSize,
) -> Result<WalkOutcome> {
    let mut out = WalkOutcome::default();
    let mut page_no = 1u32;

    loop {
        let page = source.fetch_page(page_no).await?;
        out.pages_fetched += 1;
        counter!("listing_pages_fetched_total").increment(1);

        for doc in &page.ads {
            let refreshed = Ad::refresh_time(doc)?;
            let promoted = Ad::is_promoted(doc)?;

            if refreshed > watermark {
                out.ads.push(Ad::from_document(doc, engine, photo_size)?);
                continue;
            }
            if !promoted {
                debug!(
                    target: "listing",
                    page = page_no,
                    refreshed = %refreshed.to_rfc3339(),
                    "reached already announced organic ad"
                );
                counter!("listing_ads_collected_total").increment(out.ads.len() as u64);
                return Ok(out);
            }
            out.skipped_promoted += 1;
        }

        if page.is_last() || page.ads.is_empty() {
            break;
        }
        page_no += 1;
    }

    counter!("listing_ads_collected_total").increment(out.ads.len() as u64);
    Ok(out)
}

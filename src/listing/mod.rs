// src/listing/mod.rs
pub mod olx;
pub mod walker;

use serde_json::Value;

use crate::error::Result;

pub use walker::{collect_new_ads, WalkOutcome};

/// One fetched page of the listing, ads in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub ads: Vec<Value>,
    pub total_pages: u32,
    pub current_page: u32,
}

impl ListingPage {
    pub fn is_last(&self) -> bool {
        self.current_page >= self.total_pages
    }
}

/// Cursor-less, 1-based paginated listing.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<ListingPage>;
    fn name(&self) -> &str;
}

// src/listing/olx.rs
//! OLX long-term rental listing, read from the state blob the site embeds in
//! every page as `window.__PRERENDERED_STATE__ = "<escaped json>";`.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

use super::{ListingPage, ListingSource};
use crate::document::{self, FieldPath};
use crate::error::{Result, WatchError};

const LISTING_BASE: &str =
    "https://www.olx.ua/d/uk/nedvizhimost/kvartiry/dolgosrochnaya-arenda-kvartir";

pub struct OlxListingSource {
    mode: Mode,
}

enum Mode {
    // Pre-rendered pages, page N is `pages[N - 1]`.
    Fixture(Vec<String>),
    Http {
        query_url: String,
        client: reqwest::Client,
    },
}

impl OlxListingSource {
    pub fn new(city: &str, query_params: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            mode: Mode::Http {
                query_url: query_url(city, query_params),
                client,
            },
        })
    }

    pub fn from_fixture_pages(pages: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(pages),
        }
    }

    pub fn query_url(&self) -> Option<&str> {
        match &self.mode {
            Mode::Http { query_url, .. } => Some(query_url),
            Mode::Fixture(_) => None,
        }
    }
}

pub fn query_url(city: &str, query_params: &str) -> String {
    let mut url = format!("{LISTING_BASE}/{city}/?search[order]=created_at:desc");
    let extra = query_params.trim().trim_start_matches(['&', '?']);
    if !extra.is_empty() {
        url.push('&');
        url.push_str(extra);
    }
    url
}

pub fn page_url(query_url: &str, page: u32) -> String {
    if page > 1 {
        format!("{query_url}&page={page}")
    } else {
        query_url.to_string()
    }
}

/// Extract and decode the embedded listing state of one page.
pub fn parse_listing_html(html: &str, page: u32) -> Result<ListingPage> {
    static RE_STATE: OnceCell<Regex> = OnceCell::new();
    let re = RE_STATE.get_or_init(|| {
        Regex::new(r#"window\.__PRERENDERED_STATE__\s*=\s*(".+");"#)
            .expect("prerendered state regex")
    });

    let escaped = re
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| WatchError::listing(page, "no __PRERENDERED_STATE__ in page"))?
        .as_str();

    // The state is a JSON document serialized into a JSON string literal.
    let inner: String = serde_json::from_str(escaped)
        .map_err(|e| WatchError::listing(page, format!("state string: {e}")))?;
    let state: Value = serde_json::from_str(&inner)
        .map_err(|e| WatchError::listing(page, format!("state json: {e}")))?;

    parse_listing_state(&state, page)
}

/// `listing.listing.{ads,totalPages,currentPage}` out of a decoded state.
pub fn parse_listing_state(state: &Value, page: u32) -> Result<ListingPage> {
    let listing = FieldPath::parse("listing.listing")
        .ok_or_else(|| WatchError::listing(page, "listing path"))?
        .resolve(state)?;

    let ads = document::array_field(listing, "ads")?.to_vec();
    let total_pages = document::field(listing, "totalPages")?
        .as_u64()
        .ok_or_else(|| WatchError::listing(page, "totalPages is not a number"))?;
    let current_page = listing
        .get("currentPage")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(page));

    Ok(ListingPage {
        ads,
        total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        current_page: u32::try_from(current_page).unwrap_or(page),
    })
}

#[async_trait]
impl ListingSource for OlxListingSource {
    async fn fetch_page(&self, page: u32) -> Result<ListingPage> {
        match &self.mode {
            Mode::Fixture(pages) => {
                let html = pages
                    .get(page.saturating_sub(1) as usize)
                    .ok_or_else(|| WatchError::listing(page, "no such fixture page"))?;
                parse_listing_html(html, page)
            }
            Mode::Http { query_url, client } => {
                let url = page_url(query_url, page);
                tracing::debug!(target: "listing", %url, "fetching listing page");
                let body = client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                parse_listing_html(&body, page)
            }
        }
    }

    fn name(&self) -> &str {
        "olx"
    }
}

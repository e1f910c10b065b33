// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use olx_watcher::listing::{ListingPage, ListingSource};
use olx_watcher::notify::{Delivery, Notifier, NotifyError};
use olx_watcher::Result;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Listing served from memory; records which pages were requested.
pub struct FakeListing {
    pages: Vec<Vec<Value>>,
    pub fetched: Mutex<Vec<u32>>,
}

impl FakeListing {
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for FakeListing {
    async fn fetch_page(&self, page: u32) -> Result<ListingPage> {
        self.fetched.lock().unwrap().push(page);
        Ok(ListingPage {
            ads: self.pages[(page - 1) as usize].clone(),
            total_pages: self.pages.len() as u32,
            current_page: page,
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub enum Reply {
    Ok,
    RateLimited,
    Fail,
}

/// Records every delivery attempt; replies are scripted, default `Ok`.
#[derive(Default)]
pub struct FakeNotifier {
    script: Mutex<VecDeque<Reply>>,
    pub attempts: Mutex<Vec<Delivery>>,
    pub sent: Mutex<Vec<Delivery>>,
}

impl FakeNotifier {
    pub fn scripted(replies: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Delivery> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// First line of each sent message: the ad URL.
    pub fn sent_urls(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|d| {
                let text = match d {
                    Delivery::Text { text } => text,
                    Delivery::Photo { caption, .. } => caption,
                    Delivery::MediaGroup { caption, .. } => caption,
                };
                text.lines().next().unwrap_or_default().to_string()
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn deliver(&self, delivery: &Delivery) -> std::result::Result<(), NotifyError> {
        self.attempts.lock().unwrap().push(delivery.clone());
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => {
                self.sent.lock().unwrap().push(delivery.clone());
                Ok(())
            }
            Reply::RateLimited => Err(NotifyError::RateLimited {
                retry_after_secs: 30,
            }),
            Reply::Fail => Err(NotifyError::Api {
                status: 400,
                description: "Bad Request: chat not found".into(),
            }),
        }
    }

    fn channel_name(&self) -> &str {
        "fake-chat"
    }
}

/// Raw ad document refreshed at `2024-05-01T{hour}:00:00Z`.
pub fn raw_ad(id: u32, hour: u32, promoted: bool) -> Value {
    raw_ad_with_photos(id, hour, promoted, 0)
}

pub fn raw_ad_with_photos(id: u32, hour: u32, promoted: bool, photos: usize) -> Value {
    let photos: Vec<String> = (0..photos)
        .map(|i| format!("https://cdn.test/{id}/{i};s={{width}}x{{height}}"))
        .collect();
    json!({
        "url": format!("https://www.olx.ua/d/uk/obyavlenie/ad-{id}.html"),
        "title": format!("Квартира {id}"),
        "price": {"displayValue": "12 000 грн."},
        "createdTime": "2024-04-30T08:00:00+00:00",
        "lastRefreshTime": format!("2024-05-01T{hour:02}:00:00+00:00"),
        "isPromoted": promoted,
        "photos": photos,
        "params": [{"key": "pets", "normalizedValue": ["yes_cat"]}],
    })
}

pub fn ad_url(id: u32) -> String {
    format!("https://www.olx.ua/d/uk/obyavlenie/ad-{id}.html")
}

pub fn at(hour: u32) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(&format!("2024-05-01T{hour:02}:00:00+00:00")).unwrap()
}

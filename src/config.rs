// src/config.rs
//! Process settings, read once at startup from the environment (`.env` is
//! loaded by the binary first) and passed by reference from there on.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::ad::PhotoSize;
use crate::error::{Result, WatchError};
use crate::watermark::{FileWatermarkStore, RedisWatermarkStore, WatermarkStore};

pub const DEFAULT_WATERMARK_PATH: &str = "state/watermarks.json";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_RATE_LIMIT_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Redis { host: String, port: u16 },
    File { path: PathBuf },
}

#[derive(Clone)]
pub struct WatchConfig {
    pub bot_api_key: String,
    pub chat_id: String,
    pub city: String,
    pub query_params: String,
    pub poll_interval: Duration,
    pub store: StoreConfig,
    pub rate_limit_backoff: Duration,
    pub photo_size: PhotoSize,
}

// Keeps the bot token out of logs.
impl fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchConfig")
            .field("bot_api_key", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("city", &self.city)
            .field("query_params", &self.query_params)
            .field("poll_interval", &self.poll_interval)
            .field("store", &self.store)
            .field("rate_limit_backoff", &self.rate_limit_backoff)
            .field("photo_size", &self.photo_size)
            .finish()
    }
}

impl WatchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |k: &'static str| {
            get(k).ok_or_else(|| WatchError::config(format!("{k} is required")))
        };

        let poll_secs: u64 = parse_num("POLL_INTERVAL", &required("POLL_INTERVAL")?)?;
        if poll_secs == 0 {
            return Err(WatchError::config("POLL_INTERVAL must be greater than 0"));
        }

        let store = match get("REDIS_HOST") {
            Some(host) => StoreConfig::Redis {
                host,
                port: match get("REDIS_PORT") {
                    Some(p) => parse_num("REDIS_PORT", &p)?,
                    None => DEFAULT_REDIS_PORT,
                },
            },
            None => StoreConfig::File {
                path: PathBuf::from(
                    get("WATERMARK_PATH").unwrap_or_else(|| DEFAULT_WATERMARK_PATH.to_string()),
                ),
            },
        };

        let backoff_secs = match get("RATE_LIMIT_BACKOFF_SECS") {
            Some(v) => parse_num("RATE_LIMIT_BACKOFF_SECS", &v)?,
            None => DEFAULT_RATE_LIMIT_BACKOFF_SECS,
        };

        let photo_size = match get("PHOTO_SIZE") {
            Some(v) => PhotoSize::parse(&v).ok_or_else(|| {
                WatchError::config(format!("PHOTO_SIZE must look like 1200x900, got \"{v}\""))
            })?,
            None => PhotoSize::default(),
        };

        Ok(Self {
            bot_api_key: required("BOT_API_KEY")?,
            chat_id: required("CHAT_ID")?,
            city: required("CITY")?,
            query_params: get("QUERY_PARAMS").unwrap_or_default(),
            poll_interval: Duration::from_secs(poll_secs),
            store,
            rate_limit_backoff: Duration::from_secs(backoff_secs),
            photo_size,
        })
    }

    pub async fn open_store(&self) -> Result<Arc<dyn WatermarkStore>> {
        let store: Arc<dyn WatermarkStore> = match &self.store {
            StoreConfig::Redis { host, port } => {
                Arc::new(RedisWatermarkStore::connect(host, *port).await?)
            }
            StoreConfig::File { path } => Arc::new(FileWatermarkStore::new(path.clone())),
        };
        Ok(store)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| WatchError::config(format!("{key} must be a non-negative integer, got \"{raw}\"")))
}

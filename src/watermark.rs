//! High-water mark persistence.
//!
//! The watermark is the refresh time of the newest ad already delivered to a
//! chat. It is read once per cycle and only ever moves forward.

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;

use crate::error::{Result, WatchError};

/// String-keyed get/set; absence is a valid state.
#[async_trait::async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One key per listing (city plus query filters) and chat.
///
/// Without filters the key is `MRT_{city}_{chat}`, so existing stored
/// watermarks keep working. Filters add a short digest of the query string.
pub fn watermark_key(city: &str, chat_id: &str, query_params: &str) -> String {
    let query = query_params.trim();
    if query.is_empty() {
        format!("MRT_{city}_{chat_id}")
    } else {
        format!("MRT_{city}_{chat_id}_{}", query_digest(query))
    }
}

fn query_digest(query: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;
    let digest = Sha256::digest(query.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

pub fn min_timestamp() -> DateTime<FixedOffset> {
    DateTime::<Utc>::MIN_UTC.fixed_offset()
}

/// Current watermark for one key, with monotonic persistence.
#[derive(Debug, Clone)]
pub struct Watermark {
    key: String,
    current: DateTime<FixedOffset>,
}

impl Watermark {
    /// Absent ⇒ minimum timestamp, so the first run treats every ad as new.
    pub async fn load(store: &dyn WatermarkStore, key: &str) -> Result<Self> {
        let current = match store.get(key).await? {
            None => min_timestamp(),
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim()).map_err(|e| {
                WatchError::store(format!("stored watermark {key}={raw:?} is not RFC 3339: {e}"))
            })?,
        };
        Ok(Self {
            key: key.to_string(),
            current,
        })
    }

    pub fn current(&self) -> DateTime<FixedOffset> {
        self.current
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist `ts` if it is newer; returns whether a write happened.
    pub async fn advance(
        &mut self,
        store: &dyn WatermarkStore,
        ts: DateTime<FixedOffset>,
    ) -> Result<bool> {
        if ts <= self.current {
            return Ok(false);
        }
        store.set(&self.key, &ts.to_rfc3339()).await?;
        self.current = ts;
        Ok(true)
    }
}

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self
            .inner
            .lock()
            .map_err(|_| WatchError::store("memory store mutex poisoned"))?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| WatchError::store("memory store mutex poisoned"))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object of key → timestamp kept in a single state file.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(s) => serde_json::from_str(&s).map_err(|e| {
                WatchError::store(format!("state file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(WatchError::store(format!(
                "reading {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value.to_string());

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| WatchError::store(format!("state dir {}: {e}", dir.display())))?;
        }
        let body = serde_json::to_vec_pretty(&all)
            .map_err(|e| WatchError::store(format!("encode state: {e}")))?;

        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .map_err(|e| WatchError::store(format!("writing {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| WatchError::store(format!("renaming to {}: {e}", self.path.display())))?;
        Ok(())
    }
}

/// Redis `GET`/`SET` over a multiplexed async connection.
#[derive(Clone)]
pub struct RedisWatermarkStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisWatermarkStore {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let client = redis::Client::open(format!("redis://{host}:{port}/"))?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!(target: "watermark", %host, port, "connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl WatermarkStore for RedisWatermarkStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let v: Option<String> = conn.get(key).await?;
        Ok(v)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }
}

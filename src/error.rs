// src/error.rs

//! Error taxonomy shared by the poll cycle.
//!
//! - `Config`: bad rules or settings, fatal at startup.
//! - `Http` / `Notify`: transport failures, abort the current cycle.
//! - `Document` / `Listing`: the source changed its contract, abort the cycle.
//! - `Store`: the watermark could not be read or written.

use thiserror::Error;

use crate::document::DocumentError;
use crate::notify::NotifyError;

pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Malformed listing page {page}: {message}")]
    Listing { page: u32, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Watermark store error: {0}")]
    Store(String),

    #[error("Delivery failed: {0}")]
    Notify(#[from] NotifyError),
}

impl WatchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn listing(page: u32, message: impl std::fmt::Display) -> Self {
        Self::Listing {
            page,
            message: message.to_string(),
        }
    }

    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Only configuration errors stop the process; everything else is retried
    /// by the next scheduled cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<redis::RedisError> for WatchError {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(e.to_string())
    }
}

pub mod telegram;

use thiserror::Error;

use crate::ad::Ad;

pub use telegram::TelegramNotifier;

/// Telegram accepts at most ten items per media group.
pub const MAX_MEDIA_GROUP: usize = 10;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error ({status}): {description}")]
    Api { status: u16, description: String },
}

/// One message per ad, shaped by how many photos it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Text { text: String },
    Photo { photo: String, caption: String },
    /// Caption goes on the first item only.
    MediaGroup { photos: Vec<String>, caption: String },
}

impl Delivery {
    pub fn for_ad(ad: &Ad) -> Self {
        let text = ad.to_string();
        match ad.photos.as_slice() {
            [] => Delivery::Text { text },
            [photo] => Delivery::Photo {
                photo: photo.clone(),
                caption: text,
            },
            photos => Delivery::MediaGroup {
                photos: photos.iter().take(MAX_MEDIA_GROUP).cloned().collect(),
                caption: text,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Delivery::Text { .. } => "text",
            Delivery::Photo { .. } => "photo",
            Delivery::MediaGroup { .. } => "media_group",
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, delivery: &Delivery) -> Result<(), NotifyError>;

    /// Destination identity, used in logs.
    fn channel_name(&self) -> &str;
}

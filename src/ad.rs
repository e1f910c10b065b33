//! Normalized ad snapshot built from one raw listing document.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::fmt;

use crate::document::{self, DocumentError};
use crate::highlight::HighlightEngine;

/// Photo size substituted into `{width}x{height}` URL templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSize {
    pub width: u32,
    pub height: u32,
}

impl Default for PhotoSize {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
        }
    }
}

impl PhotoSize {
    /// Parses `1200x900`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (w, h) = raw.trim().split_once(['x', 'X'])?;
        Some(Self {
            width: w.trim().parse().ok().filter(|v| *v > 0)?,
            height: h.trim().parse().ok().filter(|v| *v > 0)?,
        })
    }

    pub fn apply(&self, template: &str) -> String {
        template
            .replace("{width}", &self.width.to_string())
            .replace("{height}", &self.height.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ad {
    pub url: String,
    pub title: String,
    pub price: String,
    pub created: DateTime<FixedOffset>,
    pub refreshed: DateTime<FixedOffset>,
    pub promoted: bool,
    pub photos: Vec<String>,
    pub highlights: String,
}

impl Ad {
    /// Reads only the fields the walker needs to decide about an ad.
    /// A refresh never predates creation.
    pub fn refresh_time(doc: &Value) -> Result<DateTime<FixedOffset>, DocumentError> {
        Ok(parse_time(doc, "lastRefreshTime")?.max(parse_time(doc, "createdTime")?))
    }

    pub fn is_promoted(doc: &Value) -> Result<bool, DocumentError> {
        document::bool_field(doc, "isPromoted")
    }

    pub fn from_document(
        doc: &Value,
        engine: &HighlightEngine,
        photo_size: PhotoSize,
    ) -> Result<Self, DocumentError> {
        let created = parse_time(doc, "createdTime")?;
        let refreshed = Self::refresh_time(doc)?;

        let price = match doc.get("price") {
            None | Some(Value::Null) => String::new(),
            Some(p) => p
                .get("displayValue")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };

        let photos = match doc.get("photos") {
            None | Some(Value::Null) => Vec::new(),
            Some(_) => document::array_field(doc, "photos")?
                .iter()
                .filter_map(photo_url)
                .map(|t| photo_size.apply(&t))
                .collect(),
        };

        Ok(Self {
            url: document::str_field(doc, "url")?.to_string(),
            title: document::str_field(doc, "title")?.to_string(),
            price,
            created,
            refreshed,
            promoted: Self::is_promoted(doc)?,
            photos,
            highlights: engine.highlight(doc)?,
        })
    }
}

// Photos are either plain URL strings or `{ "link": "..." }` objects.
fn photo_url(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("link").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn parse_time(doc: &Value, name: &str) -> Result<DateTime<FixedOffset>, DocumentError> {
    let raw = document::str_field(doc, name)?;
    DateTime::parse_from_rfc3339(raw).map_err(|_| DocumentError::WrongType {
        path: name.to_string(),
        expected: "ISO-8601 timestamp",
    })
}

impl fmt::Display for Ad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.url)?;
        if !self.title.is_empty() {
            writeln!(f, "{}", self.title)?;
        }
        if !self.price.is_empty() {
            writeln!(f, "{}", self.price)?;
        }
        writeln!(f, "Created: {}", self.created.to_rfc3339())?;
        write!(f, "Refreshed: {}", self.refreshed.to_rfc3339())?;
        if !self.highlights.is_empty() {
            write!(f, "\n{}", self.highlights)?;
        }
        Ok(())
    }
}

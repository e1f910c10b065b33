//! Fallible accessors over loosely-typed listing documents.
//!
//! Raw ads arrive as `serde_json::Value` trees. Lookups never fall back to
//! `null`: a missing field is reported with the full dotted path so a source
//! contract change is visible in the logs.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("missing field `{path}`")]
    MissingField { path: String },

    #[error("field `{path}` is not a {expected}")]
    WrongType { path: String, expected: &'static str },

    #[error("field `{path}` is not a scalar value")]
    NotScalar { path: String },
}

/// Dotted path such as `location.city.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Empty segments (`a..b`, leading or trailing dots) are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return None;
        }
        Some(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Follow the path from `root`, failing on the first absent segment.
    pub fn resolve<'a>(&self, root: &'a Value) -> Result<&'a Value, DocumentError> {
        let mut node = root;
        for (depth, seg) in self.segments.iter().enumerate() {
            node = node.get(seg.as_str()).ok_or_else(|| DocumentError::MissingField {
                path: self.segments[..=depth].join("."),
            })?;
        }
        Ok(node)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

pub fn field<'a>(doc: &'a Value, name: &str) -> Result<&'a Value, DocumentError> {
    doc.get(name).ok_or_else(|| DocumentError::MissingField {
        path: name.to_string(),
    })
}

pub fn str_field<'a>(doc: &'a Value, name: &str) -> Result<&'a str, DocumentError> {
    field(doc, name)?
        .as_str()
        .ok_or_else(|| DocumentError::WrongType {
            path: name.to_string(),
            expected: "string",
        })
}

pub fn bool_field(doc: &Value, name: &str) -> Result<bool, DocumentError> {
    field(doc, name)?
        .as_bool()
        .ok_or_else(|| DocumentError::WrongType {
            path: name.to_string(),
            expected: "boolean",
        })
}

pub fn array_field<'a>(doc: &'a Value, name: &str) -> Result<&'a [Value], DocumentError> {
    field(doc, name)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| DocumentError::WrongType {
            path: name.to_string(),
            expected: "list",
        })
}

/// Textual form of a scalar: strings as-is, numbers and booleans rendered.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

//! Highlight rules engine.
//!
//! Minimal JSON/TOML DSL mapping ad attributes to short display tags:
//! - `param` (alias `attribute`): looks up `params[].normalizedValue` for a
//!   given `key` in `valueMap`. List values are looked up member by member.
//! - `prop` (alias `path`): resolves a dotted `path` from the ad root and
//!   compares it against each `valueMap` pattern with `match`:
//!   `exact` (string equality) or `contains` (case-insensitive regex search).
//!
//! Rules are compiled once at startup; any unknown type or comparator is a
//! configuration error. Tags from all rules are concatenated in configuration
//! order and deduplicated by first occurrence.

pub mod config;

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::document::{self, DocumentError, FieldPath};
use crate::error::WatchError;

/// One rule as written in configuration, before validation.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RuleDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "match")]
    pub comparator: Option<String>,
    #[serde(rename = "valueMap", alias = "value_map", default)]
    pub value_map: IndexMap<String, String>,
}

impl RuleDescriptor {
    pub fn attribute(key: &str, pairs: &[(&str, &str)]) -> Self {
        Self {
            kind: "param".into(),
            key: Some(key.into()),
            path: None,
            comparator: None,
            value_map: to_map(pairs),
        }
    }

    pub fn path(path: &str, comparator: &str, pairs: &[(&str, &str)]) -> Self {
        Self {
            kind: "prop".into(),
            key: None,
            path: Some(path.into()),
            comparator: Some(comparator.into()),
            value_map: to_map(pairs),
        }
    }
}

fn to_map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone)]
pub enum Rule {
    Attribute(AttributeRule),
    Path(PathRule),
}

#[derive(Debug, Clone)]
pub struct AttributeRule {
    key: String,
    value_map: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PathRule {
    path: FieldPath,
    patterns: Vec<(Matcher, String)>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Contains(Regex),
}

impl Matcher {
    fn matches(&self, actual: &str) -> bool {
        match self {
            Matcher::Exact(expected) => actual == expected,
            Matcher::Contains(re) => re.is_match(actual),
        }
    }
}

impl Rule {
    pub fn compile(desc: &RuleDescriptor) -> Result<Self, WatchError> {
        match desc.kind.as_str() {
            "param" | "attribute" => {
                let key = desc
                    .key
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| WatchError::config("param rule requires a non-empty `key`"))?;
                Ok(Rule::Attribute(AttributeRule {
                    key: key.to_string(),
                    value_map: desc.value_map.clone(),
                }))
            }
            "prop" | "path" => {
                let raw_path = desc
                    .path
                    .as_deref()
                    .ok_or_else(|| WatchError::config("prop rule requires a `path`"))?;
                let path = FieldPath::parse(raw_path).ok_or_else(|| {
                    WatchError::config(format!("invalid property path \"{raw_path}\""))
                })?;
                let comparator = desc.comparator.as_deref().unwrap_or_default();
                let mut patterns = Vec::with_capacity(desc.value_map.len());
                for (pattern, tag) in &desc.value_map {
                    let matcher = match comparator {
                        "exact" => Matcher::Exact(pattern.clone()),
                        "contains" => Matcher::Contains(
                            RegexBuilder::new(pattern)
                                .case_insensitive(true)
                                .build()
                                .map_err(|e| {
                                    WatchError::config(format!(
                                        "invalid `contains` pattern \"{pattern}\": {e}"
                                    ))
                                })?,
                        ),
                        other => {
                            return Err(WatchError::config(format!(
                                "unexpected property rule match type \"{other}\""
                            )))
                        }
                    };
                    patterns.push((matcher, tag.clone()));
                }
                // An empty table still has to name a valid comparator.
                if desc.value_map.is_empty() && !matches!(comparator, "exact" | "contains") {
                    return Err(WatchError::config(format!(
                        "unexpected property rule match type \"{comparator}\""
                    )));
                }
                Ok(Rule::Path(PathRule { path, patterns }))
            }
            other => Err(WatchError::config(format!(
                "unexpected rule type \"{other}\""
            ))),
        }
    }

    /// Tags this rule contributes for one ad, in rule-table order.
    pub fn extract(&self, ad: &Value) -> Result<Vec<String>, DocumentError> {
        match self {
            Rule::Attribute(r) => r.extract(ad),
            Rule::Path(r) => r.extract(ad),
        }
    }
}

impl AttributeRule {
    fn extract(&self, ad: &Value) -> Result<Vec<String>, DocumentError> {
        let mut tags = Vec::new();
        for param in document::array_field(ad, "params")? {
            if document::str_field(param, "key")? != self.key {
                continue;
            }
            match param.get("normalizedValue") {
                Some(Value::Array(values)) => {
                    for v in values {
                        if let Some(tag) = scalar_text_lookup(&self.value_map, v) {
                            tags.push(tag);
                        }
                    }
                }
                Some(v) => {
                    if let Some(tag) = scalar_text_lookup(&self.value_map, v) {
                        tags.push(tag);
                    }
                }
                None => {}
            }
        }
        Ok(tags)
    }
}

fn scalar_text_lookup(map: &IndexMap<String, String>, v: &Value) -> Option<String> {
    document::scalar_text(v).and_then(|s| map.get(&s).cloned())
}

impl PathRule {
    fn extract(&self, ad: &Value) -> Result<Vec<String>, DocumentError> {
        let node = self.path.resolve(ad)?;
        let actual = document::scalar_text(node).ok_or_else(|| DocumentError::NotScalar {
            path: self.path.to_string(),
        })?;
        Ok(self
            .patterns
            .iter()
            .filter(|(m, _)| m.matches(&actual))
            .map(|(_, tag)| tag.clone())
            .collect())
    }
}

/// Ordered set of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct HighlightEngine {
    rules: Vec<Rule>,
}

impl HighlightEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn from_descriptors(descs: &[RuleDescriptor]) -> Result<Self, WatchError> {
        let rules = descs.iter().map(Rule::compile).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All tags for `ad`, first occurrence wins.
    pub fn tags(&self, ad: &Value) -> Result<Vec<String>, DocumentError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for rule in &self.rules {
            for tag in rule.extract(ad)? {
                if seen.insert(tag.clone()) {
                    out.push(tag);
                }
            }
        }
        Ok(out)
    }

    /// Display string: tags joined without separator.
    pub fn highlight(&self, ad: &Value) -> Result<String, DocumentError> {
        if self.rules.is_empty() {
            return Ok(String::new());
        }
        Ok(self.tags(ad)?.concat())
    }
}

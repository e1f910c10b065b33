// src/highlight/config.rs
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{HighlightEngine, RuleDescriptor};

pub const ENV_RULES_PATH: &str = "HIGHLIGHT_RULES_PATH";
pub const ENV_RULE_PREFIX: &str = "HIGHLIGHT_";

/// Load rule descriptors from an explicit path. Supports TOML or JSON formats.
pub fn load_rules_from(path: &Path) -> Result<Vec<RuleDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading highlight rules from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_rules(&content, ext.as_str())
        .with_context(|| format!("parsing highlight rules from {}", path.display()))
}

/// Looked up relative to the working directory, first match wins.
const DEFAULT_RULE_FILES: [&str; 2] = ["config/highlights.toml", "config/highlights.json"];

/// The rules file to read, if any. An explicit `HIGHLIGHT_RULES_PATH` must
/// name an existing file; otherwise the first default file present is used.
pub fn rules_file() -> Result<Option<PathBuf>> {
    if let Some(explicit) = std::env::var_os(ENV_RULES_PATH) {
        let path = PathBuf::from(explicit);
        if !path.is_file() {
            bail!("{ENV_RULES_PATH}={} is not a file", path.display());
        }
        return Ok(Some(path));
    }
    Ok(DEFAULT_RULE_FILES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file()))
}

/// Descriptors from [`rules_file`]; no file means no file rules.
pub fn load_rules_default() -> Result<Vec<RuleDescriptor>> {
    match rules_file()? {
        Some(path) => load_rules_from(&path),
        None => Ok(Vec::new()),
    }
}

/// Legacy `HIGHLIGHT_<key>=value:tag|value:tag` variables, e.g.
/// `HIGHLIGHT_pets=no:🤡|yes_cat:🐈`. Returned sorted by key.
pub fn parse_env_rules<I, K, V>(vars: I) -> Result<Vec<RuleDescriptor>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = Vec::new();
    for (k, v) in vars {
        let k = k.as_ref();
        let Some(param_key) = k.strip_prefix(ENV_RULE_PREFIX) else {
            continue;
        };
        // HIGHLIGHT_RULES_PATH is a setting, not a rule.
        if k == ENV_RULES_PATH || param_key.is_empty() {
            continue;
        }
        let mut desc = RuleDescriptor::attribute(param_key, &[]);
        for pair in v.as_ref().split('|').filter(|p| !p.trim().is_empty()) {
            let (value, tag) = pair
                .split_once(':')
                .ok_or_else(|| anyhow!("{k}: expected `value:tag`, got \"{pair}\""))?;
            desc.value_map.insert(value.to_string(), tag.to_string());
        }
        out.push(desc);
    }
    out.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(out)
}

/// File rules first, then legacy env rules; compiled into an engine.
pub fn load_engine_default() -> Result<HighlightEngine> {
    let mut descs = load_rules_default()?;
    descs.extend(parse_env_rules(highlight_env_vars()?)?);
    let engine = HighlightEngine::from_descriptors(&descs)?;
    tracing::info!(target: "highlight", rules = engine.len(), "highlight rules loaded");
    Ok(engine)
}

/// `HIGHLIGHT_*` entries of the process environment. Other variables are
/// ignored even when they are not valid UTF-8.
fn highlight_env_vars() -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for (key, value) in std::env::vars_os() {
        if !key.to_string_lossy().starts_with(ENV_RULE_PREFIX) {
            continue;
        }
        let key = key
            .into_string()
            .map_err(|k| anyhow!("{}: variable name is not valid UTF-8", k.to_string_lossy()))?;
        let value = value
            .into_string()
            .map_err(|_| anyhow!("{key}: value is not valid UTF-8"))?;
        out.push((key, value));
    }
    Ok(out)
}

fn parse_rules(s: &str, hint_ext: &str) -> Result<Vec<RuleDescriptor>> {
    match hint_ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        _ => parse_json(s).or_else(|_| parse_toml(s)),
    }
}

fn parse_toml(s: &str) -> Result<Vec<RuleDescriptor>> {
    #[derive(serde::Deserialize)]
    struct TomlRules {
        #[serde(default)]
        rules: Vec<RuleDescriptor>,
    }
    let v: TomlRules = toml::from_str(s)?;
    Ok(v.rules)
}

fn parse_json(s: &str) -> Result<Vec<RuleDescriptor>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum JsonRules {
        Bare(Vec<RuleDescriptor>),
        Wrapped { rules: Vec<RuleDescriptor> },
    }
    match serde_json::from_str::<JsonRules>(s) {
        Ok(JsonRules::Bare(v)) | Ok(JsonRules::Wrapped { rules: v }) => Ok(v),
        Err(e) => bail!("unsupported highlight rules format: {e}"),
    }
}

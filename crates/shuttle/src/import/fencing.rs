//! Fencing: placeholders in source copy that must survive translation verbatim.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static RE_MUSTACHE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*[^{}]+?\s*\}\}").unwrap());
static RE_PRINTF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(?:\d+\$|\([A-Za-z_]+\))?[-+ 0#]*\d*(?:\.\d+)?[sdifuxXeEgGc@]").unwrap());
static RE_HTML: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").unwrap());

/// Known fencer names, in detection order.
pub const FENCERS: &[&str] = &["mustache", "printf", "html"];

fn pattern(fencer: &str) -> Option<&'static Regex> {
    match fencer {
        "mustache" => Some(&*RE_MUSTACHE),
        "printf" => Some(&*RE_PRINTF),
        "html" => Some(&*RE_HTML),
        _ => None,
    }
}

/// Names of the fencers that find at least one token in `source`.
pub fn detect(source: &str) -> Vec<String> {
    FENCERS
        .iter()
        .filter(|name| pattern(name).map(|re| re.is_match(source)).unwrap_or(false))
        .map(|name| name.to_string())
        .collect()
}

/// Every fenced token of `source` under `fencers`, in order of appearance per fencer.
pub fn tokens(fencers: &[String], source: &str) -> Vec<String> {
    fencers
        .iter()
        .filter_map(|name| {
            let re = pattern(name);
            if re.is_none() {
                log::warn!("Unknown fencer '{}' ignored", name);
            }
            re
        })
        .flat_map(|re| re.find_iter(source).map(|m| m.as_str().to_string()))
        .collect()
}

/// Tokens of `source` that `copy` does not carry as many times as the source does.
pub fn missing_fences(fencers: &[String], source: &str, copy: &str) -> Vec<String> {
    let mut required: HashMap<String, usize> = HashMap::new();
    for token in tokens(fencers, source) {
        *required.entry(token).or_default() += 1;
    }
    let mut missing: Vec<String> = required
        .into_iter()
        .filter(|(token, count)| copy.matches(token.as_str()).count() < *count)
        .map(|(token, _)| token)
        .collect();
    missing.sort();
    missing
}

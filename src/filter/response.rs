//! Listing response shapes and item-count extraction.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Element selectors tried, in order, when the server omits a count.
///
/// The first selector that matches at least one element wins.
pub const ITEM_SELECTORS: &[&str] = &[
    ".product-card",
    ".category-card",
    ".item-card",
    "[data-item-id]",
];

/// A resolved listing response.
///
/// The endpoint answers either with a JSON envelope or with a bare markup
/// fragment; both normalize into this struct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterResponse {
    /// The envelope's `html` field, or the whole body for a bare fragment.
    pub markup: Option<String>,
    pub count: Option<u64>,
    pub total_count: Option<u64>,
}

impl FilterResponse {
    /// Response consisting of a raw markup fragment.
    pub fn from_markup(markup: impl Into<String>) -> Self {
        Self {
            markup: Some(markup.into()),
            count: None,
            total_count: None,
        }
    }

    /// Normalize a response body.
    ///
    /// A JSON object is read as `{ html?, count?, total_count? }` field by
    /// field; a mistyped field is dropped with a warning and the rest is kept.
    /// A JSON object is never rendered as markup. A JSON string is markup, and
    /// anything else is a raw markup fragment.
    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') {
            return match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(fields)) => Self::from_envelope(&fields),
                Ok(_) | Err(_) => {
                    tracing::warn!(len = body.len(), "Unparseable JSON response body");
                    Self::default()
                }
            };
        }
        if trimmed.starts_with('"') {
            if let Ok(markup) = serde_json::from_str::<String>(trimmed) {
                return Self::from_markup(markup);
            }
        }
        Self::from_markup(body)
    }

    fn from_envelope(fields: &Map<String, Value>) -> Self {
        let markup = match fields.get("html") {
            Some(Value::String(html)) => Some(html.clone()),
            None | Some(Value::Null) => {
                tracing::warn!("Response envelope has no html field");
                None
            }
            Some(other) => {
                tracing::warn!(value = %other, "Ignoring non-string html field");
                None
            }
        };
        Self {
            markup,
            count: count_field(fields, "count"),
            total_count: count_field(fields, "total_count"),
        }
    }

    /// Count reported by the server, preferring `total_count`.
    pub fn explicit_count(&self) -> Option<u64> {
        self.total_count.or(self.count)
    }
}

/// A non-negative integer count, or `None` with a warning when mistyped.
fn count_field(fields: &Map<String, Value>, name: &'static str) -> Option<u64> {
    match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => {
            let count = value.as_u64();
            if count.is_none() {
                tracing::warn!(field = name, value = %value, "Ignoring malformed count field");
            }
            count
        }
    }
}

// ============================================================================
// Markup Scan
// ============================================================================

enum Selector<'a> {
    Class(&'a str),
    Attribute(&'a str),
    Unsupported,
}

impl<'a> Selector<'a> {
    fn parse(raw: &'a str) -> Self {
        if let Some(class) = raw.strip_prefix('.') {
            Selector::Class(class)
        } else if let Some(attr) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Selector::Attribute(attr)
        } else {
            Selector::Unsupported
        }
    }
}

fn class_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<[a-z][^>]*?\sclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("class attribute pattern is valid")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<[a-z][^>]*>").expect("tag pattern is valid"))
}

/// Count elements in `markup` matching a single selector.
///
/// Only `.class` and `[attribute]` selectors are understood; anything else
/// counts zero.
pub fn count_matching(markup: &str, selector: &str) -> usize {
    match_offsets(markup, selector).len()
}

/// Byte offsets of the opening tags matching a single selector.
pub fn match_offsets(markup: &str, selector: &str) -> Vec<usize> {
    match Selector::parse(selector) {
        Selector::Class(class) => class_attr_regex()
            .captures_iter(markup)
            .filter(|caps| {
                caps.get(1)
                    .or_else(|| caps.get(2))
                    .is_some_and(|value| value.as_str().split_whitespace().any(|c| c == class))
            })
            .filter_map(|caps| caps.get(0).map(|m| m.start()))
            .collect(),
        Selector::Attribute(attr) => tag_regex()
            .find_iter(markup)
            .filter(|tag| has_attribute(tag.as_str(), attr))
            .map(|tag| tag.start())
            .collect(),
        Selector::Unsupported => Vec::new(),
    }
}

fn has_attribute(tag: &str, attr: &str) -> bool {
    let lower = tag.to_ascii_lowercase();
    let attr = attr.to_ascii_lowercase();
    let mut rest = lower.as_str();
    while let Some(idx) = rest.find(&attr) {
        let before = rest[..idx].chars().next_back();
        let after = rest[idx + attr.len()..].chars().next();
        let starts = before.is_some_and(char::is_whitespace);
        let ends = matches!(after, Some('=') | Some('>') | Some('/'))
            || after.is_some_and(char::is_whitespace);
        if starts && ends {
            return true;
        }
        rest = &rest[idx + attr.len()..];
    }
    false
}

/// Opening-tag offsets of rendered items, using the first selector in
/// [`ITEM_SELECTORS`] that matches anything.
pub fn item_offsets(markup: &str) -> Vec<usize> {
    ITEM_SELECTORS
        .iter()
        .map(|selector| match_offsets(markup, selector))
        .find(|offsets| !offsets.is_empty())
        .unwrap_or_default()
}

/// Estimate the number of rendered items by scanning `markup`.
pub fn count_rendered_items(markup: &str) -> u64 {
    item_offsets(markup).len() as u64
}

//! Zettel metadata and title resolution.
//!
//! Metadata arrives from the Zettelstore as a map of keys to values. Most
//! values are plain strings (`role`, `lang`, `visibility`); title-like keys
//! carry already-parsed inline markup so a title can contain emphasis or
//! code. [`MetaValue`] keeps both shapes.
//!
//! ## Resolution chains
//!
//! Several values are looked up along a fallback chain where the first
//! non-empty value wins:
//!
//! ```text
//! slide title:     slide-title → title → zettel id
//! zettel title:    title → zettel id
//! author etc.:     slide-set metadata → presenter configuration
//! ```
//!
//! The chains are implemented once here and used by the slide set and by
//! every renderer, so they all agree on what a slide is called.

use crate::content::{Inline, plain_text};
use crate::zid::ZettelId;
use std::collections::BTreeMap;

pub const KEY_TITLE: &str = "title";
pub const KEY_SLIDE_TITLE: &str = "slide-title";
pub const KEY_SUB_TITLE: &str = "sub-title";
pub const KEY_AUTHOR: &str = "author";
pub const KEY_COPYRIGHT: &str = "copyright";
pub const KEY_LICENSE: &str = "license";
pub const KEY_LANG: &str = "lang";
pub const KEY_ROLE: &str = "role";
pub const KEY_SLIDE_ROLE: &str = "slide-role";
/// Only meaningful in the presenter configuration zettel.
pub const KEY_SLIDESET_ROLE: &str = "slideset-role";
pub const KEY_VISIBILITY: &str = "visibility";
pub const KEY_SYNTAX: &str = "syntax";

pub const VISIBILITY_PUBLIC: &str = "public";

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Inlines(Vec<Inline>),
}

impl MetaValue {
    /// The value as plain text.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Inlines(inlines) => plain_text(inlines),
        }
    }

    /// The value as inline markup. Plain strings become a single text node.
    pub fn to_inlines(&self) -> Vec<Inline> {
        match self {
            Self::Text(s) if s.is_empty() => Vec::new(),
            Self::Text(s) => vec![Inline::Text(s.clone())],
            Self::Inlines(inlines) => inlines.clone(),
        }
    }
}

/// Metadata of one zettel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta(BTreeMap<String, MetaValue>);

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style insert of a plain string value.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, MetaValue::Text(value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    /// Plain text of a key, `None` if missing or blank.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(MetaValue::to_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Inline markup of a key, `None` if missing or empty.
    pub fn inlines(&self, key: &str) -> Option<Vec<Inline>> {
        self.get(key)
            .map(MetaValue::to_inlines)
            .filter(|inlines| !inlines.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Resolve a field from multiple sources.
///
/// Returns the first non-None, non-blank value, trimmed.
///
/// ```text
/// author:    resolve(&[slideset_author, config_author])
/// ```
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// `slide-title`, else `title`.
pub fn slide_title(meta: &Meta) -> Option<Vec<Inline>> {
    meta.inlines(KEY_SLIDE_TITLE)
        .or_else(|| meta.inlines(KEY_TITLE))
}

/// `slide-title`, else `title`, else the zettel id as text.
pub fn slide_title_or_zid(meta: &Meta, zid: &ZettelId) -> Vec<Inline> {
    slide_title(meta).unwrap_or_else(|| vec![Inline::Text(zid.to_string())])
}

/// `title`, else the zettel id as text. Used where the zettel is shown as
/// itself rather than as a slide.
pub fn title_or_zid(meta: &Meta, zid: &ZettelId) -> Vec<Inline> {
    meta.inlines(KEY_TITLE)
        .unwrap_or_else(|| vec![Inline::Text(zid.to_string())])
}

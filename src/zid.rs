//! Zettel identifiers.
//!
//! A Zettelstore identifier is a 14-digit timestamp-like string such as
//! `20230419101112`. The presenter never looks inside it beyond the validity
//! check: identifiers arrive from URLs, link references and order lists, and
//! are compared for equality and used as map keys.
//!
//! ```text
//! "20230419101112"  → valid
//! "00000000000000"  → invalid (reserved "no zettel" value)
//! "2023041910111"   → invalid (13 digits)
//! "2023-04-19"      → invalid
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits in a valid identifier.
const ZID_LEN: usize = 14;

/// Opaque zettel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZettelId(String);

impl ZettelId {
    /// Zettel that holds presenter configuration in the Zettelstore.
    pub const CONFIG: &'static str = "00009000001000";
    /// Zettel shown for the root URL.
    pub const DEFAULT_HOME: &'static str = "00010000000000";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn config() -> Self {
        Self::new(Self::CONFIG)
    }

    pub fn default_home() -> Self {
        Self::new(Self::DEFAULT_HOME)
    }

    /// Parse a string, returning `None` unless it is a valid identifier.
    pub fn parse(value: &str) -> Option<Self> {
        let zid = Self::new(value);
        zid.is_valid().then_some(zid)
    }

    /// Fourteen ASCII digits, not all zero.
    pub fn is_valid(&self) -> bool {
        self.0.len() == ZID_LEN
            && self.0.bytes().all(|b| b.is_ascii_digit())
            && self.0.bytes().any(|b| b != b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZettelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZettelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

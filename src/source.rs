//! Where zettel come from.
//!
//! The presenter never parses zettel markup itself. A [`ContentSource`]
//! hands out metadata, parsed content trees and raw bytes by identifier,
//! plus the ordered reference list of a slide-set zettel and the result of a
//! zettel search. The production
//! implementation talks to a Zettelstore over HTTP
//! ([`crate::client::ZettelstoreClient`]); tests use the in-memory
//! `MockSource` from this module's test section.
//!
//! One source is shared by every request the server handles, so
//! implementations must be `Send + Sync`.

use crate::content::Block;
use crate::meta::Meta;
use crate::zid::ZettelId;
use crate::zjson::DecodeError;
use thiserror::Error;

/// Tracing target for content-source operations.
pub const TRACING_TARGET: &str = "zettel_presenter::source";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("zettel {0} not found")]
    NotFound(ZettelId),
    #[error("zettelstore answered {status} for {url}")]
    Status { status: u16, url: String },
    #[error("cannot reach zettelstore: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("cannot decode zettel {zid}: {source}")]
    Decode {
        zid: ZettelId,
        #[source]
        source: DecodeError,
    },
    #[error("cannot decode zettel list: {0}")]
    DecodeList(#[source] DecodeError),
    #[error("invalid zettelstore URL: {0}")]
    Url(#[from] url::ParseError),
}

impl SourceError {
    /// True when the zettel simply does not exist, as opposed to the store
    /// being unreachable or misbehaving.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A zettel with metadata and parsed content.
#[derive(Debug, Clone, PartialEq)]
pub struct Zettel {
    pub zid: ZettelId,
    pub meta: Meta,
    pub content: Vec<Block>,
}

/// One entry of a zettel order, with the shallow metadata of the referenced
/// zettel.
#[derive(Debug, Clone, PartialEq)]
pub struct ZettelRef {
    pub zid: ZettelId,
    pub meta: Meta,
}

/// The ordered list of zettel referenced by a listing zettel, in the order
/// its content mentions them. This is the table of contents of a slide set.
#[derive(Debug, Clone, PartialEq)]
pub struct ZettelOrder {
    pub zid: ZettelId,
    pub meta: Meta,
    pub list: Vec<ZettelRef>,
}

/// Read access to a zettel store.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    /// Metadata only.
    async fn fetch_meta(&self, zid: &ZettelId) -> Result<Meta, SourceError>;

    /// Metadata and parsed content.
    async fn fetch_zettel(&self, zid: &ZettelId) -> Result<Zettel, SourceError>;

    /// Unparsed content bytes, e.g. image data.
    async fn fetch_raw(&self, zid: &ZettelId) -> Result<Vec<u8>, SourceError>;

    /// The ordered reference list of a listing zettel.
    async fn fetch_order(&self, zid: &ZettelId) -> Result<ZettelOrder, SourceError>;

    /// Zettel matching a URL-encoded Zettelstore query; an empty query
    /// lists every zettel.
    async fn fetch_list(&self, query: &str) -> Result<Vec<ZettelRef>, SourceError>;
}

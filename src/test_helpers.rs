//! Shared test utilities for the presenter test suite.
//!
//! Provides zid and metadata builders, content fixtures and extractors that
//! work with slide-set data structures (`SlideSet`, `SlideSequence`).
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let source = MockSource::new()
//!     .with_zettel(zid(1), titled("A"), vec![link_to(&zid(3))])
//!     .with_zettel(zid(3), public("C"), vec![]);
//! let set = completed_set(&source, &[zid(1)]).await;
//!
//! assert_eq!(seq_zids(&set), vec![zid(1), zid(3)]);
//! ```

use crate::config::SlidesConfig;
use crate::content::{Attributes, Block, Inline, VerbatimKind};
use crate::meta::{KEY_SLIDE_ROLE, KEY_TITLE, KEY_VISIBILITY, Meta, VISIBILITY_PUBLIC};
use crate::slide::SlideSequence;
use crate::slideset::SlideSet;
use crate::zid::ZettelId;
use tokio_util::sync::CancellationToken;

pub use crate::source::tests::{MockSource, RecordedCall};

/// Zettel id of the slide-set zettel in fixtures.
pub const ROOT: &str = "20230101000000";

// =========================================================================
// Builders
// =========================================================================

/// Zettel id number `n`, e.g. `zid(3)` is `20230101000003`.
pub fn zid(n: u64) -> ZettelId {
    ZettelId::new(format!("{:014}", 20230101000000 + n))
}

pub fn root() -> ZettelId {
    ZettelId::new(ROOT)
}

pub fn titled(title: &str) -> Meta {
    Meta::new().with(KEY_TITLE, title)
}

/// Titled metadata with public visibility.
pub fn public(title: &str) -> Meta {
    titled(title).with(KEY_VISIBILITY, VISIBILITY_PUBLIC)
}

pub fn with_role(meta: Meta, role: &str) -> Meta {
    meta.with(KEY_SLIDE_ROLE, role)
}

/// Paragraph holding a single link to another zettel.
pub fn link_to(target: &ZettelId) -> Block {
    Block::Paragraph(vec![Inline::zettel_link(
        target,
        vec![Inline::text(target.to_string())],
    )])
}

/// Paragraph holding a single embedded zettel image.
pub fn embed_of(target: &ZettelId, syntax: &str) -> Block {
    Block::Paragraph(vec![Inline::embed(target, syntax)])
}

pub fn mermaid(source: &str) -> Block {
    Block::Verbatim {
        kind: VerbatimKind::Eval,
        attrs: Attributes::with_default("mermaid"),
        content: source.to_string(),
    }
}

// =========================================================================
// Set construction
// =========================================================================

/// A slide set over `ROOT` with the given explicit slides, not completed.
pub async fn loaded_set(source: &MockSource, list: &[ZettelId]) -> SlideSet {
    let token = CancellationToken::new();
    let mut set = SlideSet::new(root(), titled("Deck")).with_defaults(&SlidesConfig::default());
    for zid in list {
        set.add_slide(zid, source, &token).await.unwrap();
    }
    set
}

/// Like [`loaded_set`], then completed.
pub async fn completed_set(source: &MockSource, list: &[ZettelId]) -> SlideSet {
    let mut set = loaded_set(source, list).await;
    set.complete(source, &CancellationToken::new()).await.unwrap();
    set
}

// =========================================================================
// Extractors
// =========================================================================

/// Zids of the set's slide sequence, repeats included.
pub fn seq_zids(set: &SlideSet) -> Vec<ZettelId> {
    set.slide_list().iter().map(|s| s.zid().clone()).collect()
}

/// `(zid, number, slide_no)` for each record of a document chain.
pub fn doc_numbers(seq: &SlideSequence) -> Vec<(ZettelId, Option<usize>, Option<usize>)> {
    seq.iter()
        .map(|n| (n.slide().zid().clone(), n.number(), n.slide_no()))
        .collect()
}

/// `slide_no` of every split child, in show order.
pub fn child_slide_nos(seq: &SlideSequence) -> Vec<usize> {
    seq.iter()
        .flat_map(|n| n.children().filter_map(|c| c.slide_no()).collect::<Vec<_>>())
        .collect()
}

//! Slides and numbered slide sequences.
//!
//! A [`Slide`] wraps one zettel as a displayable unit. Slides are immutable
//! and shared behind `Arc`, so the same zettel listed twice in a slide set is
//! one slide referenced twice.
//!
//! ## Sequences
//!
//! Renderers do not walk slides directly. They ask the slide set for a
//! [`SlideSequence`]: an arena of [`SlideInfo`] records linked into two
//! independent chains.
//!
//! ```text
//! document chain:   [A] ⇄ [B] ⇄ [C]            prev / next
//!                    │     │
//! split children:   [A1]  [B1] ⇄ [B2] ⇄ [B3]   child / last_child, sibling next
//! ```
//!
//! The document chain has one record per slide occurrence and carries the
//! table-of-contents `number`. Each record may own a chain of split
//! children, one per level-1 heading section of the slide content, which
//! carry the show's `slide_no`. Links are arena indices, so there are no
//! ownership cycles; [`SlideNode`] is the borrowed handle renderers navigate
//! with.
//!
//! ## Splitting
//!
//! [`split`] cuts a slide's top-level blocks at every level-1 heading with a
//! non-empty title. The heading becomes the title of the section that
//! follows it. Content before the first heading keeps the slide's own title;
//! when there is no such content, no empty leading section is produced. A
//! slide without qualifying headings yields exactly one section with the
//! unchanged content.

use crate::content::{Block, Inline};
use crate::meta::{self, KEY_LANG, KEY_SLIDE_ROLE, Meta};
use crate::zid::ZettelId;
use std::sync::Arc;

/// Role a slide can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideRole {
    /// The live presentation.
    Show,
    /// The printed handout.
    Handout,
}

impl SlideRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Handout => "handout",
        }
    }
}

impl std::fmt::Display for SlideRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One zettel as a displayable unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    zid: ZettelId,
    title: Vec<Inline>,
    lang: Option<String>,
    role: Option<String>,
    content: Vec<Block>,
}

impl Slide {
    /// Build a slide from zettel metadata and content.
    ///
    /// Title: `slide-title`, else `title`, else the zid. Role: `slide-role`,
    /// unset if missing.
    pub fn new(zid: ZettelId, meta: &Meta, content: Vec<Block>) -> Self {
        Self {
            title: meta::slide_title_or_zid(meta, &zid),
            lang: meta.text(KEY_LANG),
            role: meta.text(KEY_SLIDE_ROLE),
            zid,
            content,
        }
    }

    /// A stand-in for a zettel that could not be loaded. It is listed like
    /// any other slide so the deck keeps its shape and shows the problem.
    pub fn placeholder(zid: ZettelId, error: &str) -> Self {
        Self {
            title: vec![Inline::Text(format!("Error: zettel {zid}"))],
            lang: None,
            role: None,
            content: vec![Block::paragraph(error)],
            zid,
        }
    }

    /// Set the role unless the zettel declared one itself.
    pub fn with_default_role(mut self, role: SlideRole) -> Self {
        if self.role.is_none() {
            self.role = Some(role.as_str().to_string());
        }
        self
    }

    fn make_child(&self, title: Vec<Inline>, content: Vec<Block>) -> Self {
        Self {
            zid: self.zid.clone(),
            title,
            lang: self.lang.clone(),
            role: self.role.clone(),
            content,
        }
    }

    pub fn zid(&self) -> &ZettelId {
        &self.zid
    }

    pub fn title(&self) -> &[Inline] {
        &self.title
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn content(&self) -> &[Block] {
        &self.content
    }

    /// Whether the slide is rendered for `role`.
    ///
    /// An unset slide role matches every role, and `None` as the requested
    /// role matches every slide.
    pub fn has_role(&self, role: Option<SlideRole>) -> bool {
        match (role, self.role.as_deref()) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(own)) => own == wanted.as_str(),
        }
    }
}

/// Split a slide into sections at its level-1 headings. Never empty.
///
/// Content that opens with such a heading gets no empty leading section;
/// earlier presenters emitted one carrying the slide title.
pub fn split(slide: &Slide) -> Vec<Slide> {
    let mut sections = Vec::new();
    let mut title = slide.title.clone();
    let mut run = Vec::new();
    for block in &slide.content {
        match block.split_title() {
            Some(next_title) => {
                if !sections.is_empty() || !run.is_empty() {
                    sections.push(slide.make_child(title, std::mem::take(&mut run)));
                }
                title = next_title.to_vec();
            }
            None => run.push(block.clone()),
        }
    }
    sections.push(slide.make_child(title, run));
    sections
}

// ============================================================================
// Sequences
// ============================================================================

/// One record of a [`SlideSequence`].
#[derive(Debug, Clone)]
pub struct SlideInfo {
    slide: Arc<Slide>,
    number: Option<usize>,
    slide_no: Option<usize>,
    prev: Option<usize>,
    next: Option<usize>,
    oldest: Option<usize>,
    youngest: Option<usize>,
}

impl SlideInfo {
    fn new(slide: Arc<Slide>) -> Self {
        Self {
            slide,
            number: None,
            slide_no: None,
            prev: None,
            next: None,
            oldest: None,
            youngest: None,
        }
    }
}

/// Numbered traversal order of a slide set, produced per render call.
#[derive(Debug, Clone, Default)]
pub struct SlideSequence {
    nodes: Vec<SlideInfo>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl SlideSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// First record of the document chain, `None` if empty.
    pub fn head(&self) -> Option<SlideNode<'_>> {
        self.head.map(|idx| SlideNode { seq: self, idx })
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Records of the document chain in order.
    pub fn iter(&self) -> impl Iterator<Item = SlideNode<'_>> {
        std::iter::successors(self.head(), |node| node.next())
    }

    /// Append a record to the document chain, returning its index.
    pub(crate) fn push(&mut self, slide: Arc<Slide>) -> usize {
        let idx = self.nodes.len();
        let mut info = SlideInfo::new(slide);
        info.prev = self.tail;
        self.nodes.push(info);
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        idx
    }

    /// Split the slide of record `idx` and attach the sections as its
    /// children. Returns the child indices in order.
    pub(crate) fn split_children(&mut self, idx: usize) -> Vec<usize> {
        let sections = split(&self.nodes[idx].slide);
        let mut indices = Vec::with_capacity(sections.len());
        let mut youngest: Option<usize> = None;
        for section in sections {
            let child = self.nodes.len();
            let mut info = SlideInfo::new(Arc::new(section));
            info.prev = youngest;
            self.nodes.push(info);
            if let Some(y) = youngest {
                self.nodes[y].next = Some(child);
            }
            youngest = Some(child);
            indices.push(child);
        }
        self.nodes[idx].oldest = indices.first().copied();
        self.nodes[idx].youngest = youngest;
        indices
    }

    pub(crate) fn set_number(&mut self, idx: usize, number: usize) {
        self.nodes[idx].number = Some(number);
    }

    pub(crate) fn set_slide_no(&mut self, idx: usize, slide_no: usize) {
        self.nodes[idx].slide_no = Some(slide_no);
    }
}

/// Borrowed handle to one record of a [`SlideSequence`].
#[derive(Debug, Clone, Copy)]
pub struct SlideNode<'a> {
    seq: &'a SlideSequence,
    idx: usize,
}

impl<'a> SlideNode<'a> {
    fn info(&self) -> &'a SlideInfo {
        &self.seq.nodes[self.idx]
    }

    fn at(&self, idx: Option<usize>) -> Option<SlideNode<'a>> {
        idx.map(|idx| SlideNode { seq: self.seq, idx })
    }

    pub fn slide(&self) -> &'a Slide {
        &self.info().slide
    }

    pub fn slide_arc(&self) -> &'a Arc<Slide> {
        &self.info().slide
    }

    /// Position in the document (table of contents).
    pub fn number(&self) -> Option<usize> {
        self.info().number
    }

    /// Position in the show.
    pub fn slide_no(&self) -> Option<usize> {
        self.info().slide_no
    }

    pub fn next(&self) -> Option<SlideNode<'a>> {
        self.at(self.info().next)
    }

    pub fn prev(&self) -> Option<SlideNode<'a>> {
        self.at(self.info().prev)
    }

    /// First split section.
    pub fn child(&self) -> Option<SlideNode<'a>> {
        self.at(self.info().oldest)
    }

    /// Last split section.
    pub fn last_child(&self) -> Option<SlideNode<'a>> {
        self.at(self.info().youngest)
    }

    /// Split sections in order.
    pub fn children(&self) -> impl Iterator<Item = SlideNode<'a>> + 'a {
        std::iter::successors(self.child(), |node| node.next())
    }

    /// Show numbers covered by this record's sections, `(first, last)`.
    pub fn slide_no_range(&self) -> Option<(usize, usize)> {
        let first = self.child()?.slide_no()?;
        let last = self.last_child()?.slide_no()?;
        Some((first, last))
    }

    /// Nearest record showing `zid`, searching backward (including this
    /// record) before forward. With a zettel listed twice, a link resolves
    /// to the closest earlier occurrence.
    pub fn find_slide(&self, zid: &ZettelId) -> Option<SlideNode<'a>> {
        let backward = std::iter::successors(Some(*self), |node| node.prev());
        let forward = std::iter::successors(self.next(), |node| node.next());
        backward.chain(forward).find(|node| node.slide().zid() == zid)
    }
}

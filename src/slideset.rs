//! Slide sets: the zettel of one presentation, in order.
//!
//! A [`SlideSet`] is built per request. It starts from the metadata of the
//! slide-set zettel, receives the zettel of its table of contents one by one
//! through [`SlideSet::add_slide`], and is then completed exactly once with
//! [`SlideSet::complete`]. Only a completed set can be rendered.
//!
//! ## Contents
//!
//! ```text
//! seq     [A, B, A, C]           document order, repeats allowed
//! index   {A → ·, B → ·, C → ·}  one shared slide per zettel, first fetch wins
//! images  {I → (png, bytes)}     embedded images found during completion
//! mermaid true                   some slide needs client-side diagrams
//! ```
//!
//! ## Completion
//!
//! Slides link to other zettel and embed images that are not listed in the
//! table of contents. Completion walks the content of every slide with an
//! explicit worklist and a visited set, so link cycles terminate and deep
//! link chains cannot overflow the stack:
//!
//! 1. Seed the stack with the listed zids, reversed, so the first pop is the
//!    first slide.
//! 2. Pop a zid; skip it if already visited, otherwise mark it and walk its
//!    slide's content.
//! 3. A link to a zettel that is neither visited nor already a slide is
//!    fetched. Public zettel are appended as additional slides and pushed.
//! 4. An embedded zettel image that is not cached yet is fetched raw and
//!    cached with its syntax.
//! 5. A Mermaid eval block anywhere sets the Mermaid flag.
//!
//! Fetch failures and non-public zettel only drop the affected node. Every
//! fetch races the request's cancellation token; cancellation aborts the
//! walk and leaves the set incomplete.
//!
//! ## Numbering
//!
//! [`SlideSet::slides`] produces a fresh [`SlideSequence`] per call. For the
//! show, every split section counts as its own slide and the record shares
//! its number with its first section. For the handout, every slide counts
//! once, and slides that are also shown carry the range of show numbers
//! their sections occupy so a handout can say "Slides 5–7".

use crate::config::SlidesConfig;
use crate::content::{Block, Inline, Node, walk_blocks};
use crate::meta::{
    self, KEY_AUTHOR, KEY_COPYRIGHT, KEY_LANG, KEY_LICENSE, KEY_SUB_TITLE, KEY_VISIBILITY, Meta,
    VISIBILITY_PUBLIC,
};
use crate::slide::{Slide, SlideRole, SlideSequence, split};
use crate::source::{ContentSource, SourceError};
use crate::zid::ZettelId;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Tracing target for slide-set assembly.
pub const TRACING_TARGET: &str = "zettel_presenter::slideset";

#[derive(Error, Debug)]
pub enum SlideSetError {
    #[error("cannot load slide set {zid}: {source}")]
    Root {
        zid: ZettelId,
        #[source]
        source: SourceError,
    },
    #[error("zettel {0} was queued for completion but is not part of the slide set")]
    MissingSlide(ZettelId),
    #[error("slide set assembly was cancelled")]
    Cancelled,
}

/// An embedded image fetched during completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub syntax: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct SlideSet {
    zid: ZettelId,
    meta: Meta,
    defaults: SlidesConfig,
    seq: Vec<Arc<Slide>>,
    index: HashMap<ZettelId, Arc<Slide>>,
    images: HashMap<ZettelId, Image>,
    completed: bool,
    has_mermaid: bool,
}

/// Await `fut` unless `token` is cancelled first.
async fn cancellable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, SlideSetError> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(SlideSetError::Cancelled),
        out = fut => Ok(out),
    }
}

impl SlideSet {
    pub fn new(zid: ZettelId, meta: Meta) -> Self {
        Self {
            zid,
            meta,
            defaults: SlidesConfig::default(),
            seq: Vec::new(),
            index: HashMap::new(),
            images: HashMap::new(),
            completed: false,
            has_mermaid: false,
        }
    }

    /// Configuration fallbacks for author, copyright, license and language.
    pub fn with_defaults(mut self, defaults: &SlidesConfig) -> Self {
        self.defaults = defaults.clone();
        self
    }

    /// Fetch the order of slide-set zettel `zid` and add every listed zettel.
    ///
    /// Only a failure to fetch the order itself is an error; listed zettel
    /// that cannot be loaded become placeholder slides. The result is not
    /// completed yet.
    pub async fn load(
        source: &dyn ContentSource,
        zid: &ZettelId,
        defaults: &SlidesConfig,
        token: &CancellationToken,
    ) -> Result<Self, SlideSetError> {
        let order = cancellable(token, source.fetch_order(zid))
            .await?
            .map_err(|source| SlideSetError::Root {
                zid: zid.clone(),
                source,
            })?;
        let mut set = Self::new(zid.clone(), order.meta).with_defaults(defaults);
        for entry in &order.list {
            set.add_slide(&entry.zid, source, token).await?;
        }
        tracing::debug!(
            target: TRACING_TARGET,
            zid = %zid,
            slides = set.seq.len(),
            "loaded slide set"
        );
        Ok(set)
    }

    pub fn zid(&self) -> &ZettelId {
        &self.zid
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Slides in document order, repeats included.
    pub fn slide_list(&self) -> &[Arc<Slide>] {
        &self.seq
    }

    pub fn get_slide(&self, zid: &ZettelId) -> Option<&Arc<Slide>> {
        self.index.get(zid)
    }

    pub fn slide_zids(&self) -> Vec<ZettelId> {
        self.seq.iter().map(|s| s.zid().clone()).collect()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn insert(&mut self, slide: Arc<Slide>) {
        self.index.insert(slide.zid().clone(), Arc::clone(&slide));
        self.seq.push(slide);
    }

    /// Append zettel `zid` to the set.
    ///
    /// A zettel already in the set is appended again as the same slide,
    /// without fetching. A zettel that cannot be fetched is appended as a
    /// placeholder slide showing the error.
    pub async fn add_slide(
        &mut self,
        zid: &ZettelId,
        source: &dyn ContentSource,
        token: &CancellationToken,
    ) -> Result<(), SlideSetError> {
        if let Some(slide) = self.index.get(zid) {
            let slide = Arc::clone(slide);
            self.seq.push(slide);
            return Ok(());
        }
        let slide = match cancellable(token, source.fetch_zettel(zid)).await? {
            Ok(zettel) => Slide::new(zettel.zid, &zettel.meta, zettel.content),
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    zid = %zid,
                    error = %err,
                    "listed zettel unavailable, using placeholder"
                );
                Slide::placeholder(zid.clone(), &err.to_string())
            }
        };
        self.insert(Arc::new(slide));
        Ok(())
    }

    /// Append a zettel discovered during completion.
    ///
    /// Discovered zettel are reference material: unless they declare a
    /// `slide-role` themselves they only appear in the handout.
    pub fn additional_slide(&mut self, zid: ZettelId, meta: &Meta, content: Vec<Block>) {
        let slide = Slide::new(zid, meta, content).with_default_role(SlideRole::Handout);
        self.insert(Arc::new(slide));
    }

    // ========================================================================
    // Sequencing
    // ========================================================================

    /// Numbered traversal of the slides rendered for `role`, starting at
    /// `offset`.
    pub fn slides(&self, role: SlideRole, offset: usize) -> SlideSequence {
        match role {
            SlideRole::Show => self.slides_for_show(offset),
            SlideRole::Handout => self.slides_for_handout(offset),
        }
    }

    fn slides_for_show(&self, offset: usize) -> SlideSequence {
        let mut seq = SlideSequence::new();
        let mut slide_no = offset;
        for slide in self.seq.iter().filter(|s| s.has_role(Some(SlideRole::Show))) {
            let idx = seq.push(Arc::clone(slide));
            seq.set_number(idx, slide_no);
            seq.set_slide_no(idx, slide_no);
            for (i, child) in seq.split_children(idx).into_iter().enumerate() {
                if i > 0 {
                    slide_no += 1;
                }
                seq.set_number(child, slide_no);
                seq.set_slide_no(child, slide_no);
            }
            slide_no += 1;
        }
        seq
    }

    fn slides_for_handout(&self, offset: usize) -> SlideSequence {
        let mut seq = SlideSequence::new();
        let mut number = offset;
        let mut slide_no = offset;
        for slide in &self.seq {
            let shown = slide.has_role(Some(SlideRole::Show));
            if !slide.has_role(Some(SlideRole::Handout)) {
                // Not in the handout, but keep show numbers in step.
                if shown {
                    slide_no += split(slide).len();
                }
                continue;
            }
            let idx = seq.push(Arc::clone(slide));
            seq.set_number(idx, number);
            number += 1;
            if shown {
                seq.set_slide_no(idx, slide_no);
                for child in seq.split_children(idx) {
                    seq.set_slide_no(child, slide_no);
                    slide_no += 1;
                }
            }
        }
        seq
    }

    // ========================================================================
    // Images and flags
    // ========================================================================

    pub fn has_image(&self, zid: &ZettelId) -> bool {
        self.images.contains_key(zid)
    }

    pub fn add_image(&mut self, zid: ZettelId, syntax: impl Into<String>, data: Vec<u8>) {
        self.images.insert(
            zid,
            Image {
                syntax: syntax.into(),
                data,
            },
        );
    }

    pub fn get_image(&self, zid: &ZettelId) -> Option<&Image> {
        self.images.get(zid)
    }

    /// Zids of all cached images, sorted.
    pub fn images(&self) -> Vec<ZettelId> {
        let mut zids: Vec<_> = self.images.keys().cloned().collect();
        zids.sort();
        zids
    }

    pub fn has_mermaid(&self) -> bool {
        self.has_mermaid
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// `slide-title`, else `title`.
    pub fn title(&self) -> Option<Vec<Inline>> {
        meta::slide_title(&self.meta)
    }

    pub fn subtitle(&self) -> Option<Vec<Inline>> {
        self.meta.inlines(KEY_SUB_TITLE)
    }

    pub fn lang(&self) -> Option<String> {
        self.meta_or_default(KEY_LANG, &self.defaults.lang)
    }

    pub fn author(&self) -> Option<String> {
        self.meta_or_default(KEY_AUTHOR, &self.defaults.author)
    }

    pub fn copyright(&self) -> Option<String> {
        self.meta_or_default(KEY_COPYRIGHT, &self.defaults.copyright)
    }

    pub fn license(&self) -> Option<String> {
        self.meta_or_default(KEY_LICENSE, &self.defaults.license)
    }

    fn meta_or_default(&self, key: &str, default: &str) -> Option<String> {
        meta::resolve(&[self.meta.text(key).as_deref(), Some(default)])
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Pull in linked zettel and embedded images. Runs once; later calls
    /// return immediately.
    ///
    /// Returns [`SlideSetError::Cancelled`] if `token` fires first, leaving
    /// the set incomplete.
    pub async fn complete(
        &mut self,
        source: &dyn ContentSource,
        token: &CancellationToken,
    ) -> Result<(), SlideSetError> {
        if self.completed {
            return Ok(());
        }
        let mut walk = Closure::new(&self.slide_zids());
        while let Some(zid) = walk.stack.pop() {
            if token.is_cancelled() {
                return Err(SlideSetError::Cancelled);
            }
            if !walk.visited.insert(zid.clone()) {
                continue;
            }
            let slide = self
                .index
                .get(&zid)
                .cloned()
                .ok_or_else(|| SlideSetError::MissingSlide(zid.clone()))?;
            for found in collect(slide.content()) {
                match found {
                    Found::Zettel(target) => self.visit_zettel(target, &mut walk, source, token).await?,
                    Found::Image(target, syntax) => {
                        self.visit_image(target, syntax, &mut walk, source, token)
                            .await?
                    }
                    Found::Mermaid => walk.has_mermaid = true,
                }
            }
        }
        self.has_mermaid |= walk.has_mermaid;
        self.completed = true;
        tracing::debug!(
            target: TRACING_TARGET,
            zid = %self.zid,
            slides = self.seq.len(),
            images = self.images.len(),
            mermaid = self.has_mermaid,
            "completed slide set"
        );
        Ok(())
    }

    async fn visit_zettel(
        &mut self,
        zid: ZettelId,
        walk: &mut Closure,
        source: &dyn ContentSource,
        token: &CancellationToken,
    ) -> Result<(), SlideSetError> {
        if walk.visited.contains(&zid)
            || walk.dropped_zettel.contains(&zid)
            || self.index.contains_key(&zid) {
            return Ok(());
        }
        let zettel = match cancellable(token, source.fetch_zettel(&zid)).await? {
            Ok(zettel) => zettel,
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    zid = %zid,
                    error = %err,
                    "skipping linked zettel"
                );
                walk.dropped_zettel.insert(zid);
                return Ok(());
            }
        };
        if zettel.meta.text(KEY_VISIBILITY).as_deref() != Some(VISIBILITY_PUBLIC) {
            tracing::debug!(target: TRACING_TARGET, zid = %zid, "linked zettel is not public");
            walk.dropped_zettel.insert(zid);
            return Ok(());
        }
        self.additional_slide(zid.clone(), &zettel.meta, zettel.content);
        walk.stack.push(zid);
        Ok(())
    }

    async fn visit_image(
        &mut self,
        zid: ZettelId,
        syntax: String,
        walk: &mut Closure,
        source: &dyn ContentSource,
        token: &CancellationToken,
    ) -> Result<(), SlideSetError> {
        if self.has_image(&zid) {
            tracing::debug!(target: TRACING_TARGET, zid = %zid, "image already cached");
            return Ok(());
        }
        if walk.dropped_images.contains(&zid) {
            return Ok(());
        }
        match cancellable(token, source.fetch_raw(&zid)).await? {
            Ok(data) => self.add_image(zid, syntax, data),
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    zid = %zid,
                    error = %err,
                    "skipping embedded image"
                );
                walk.dropped_images.insert(zid);
            }
        }
        Ok(())
    }
}

/// Worklist state of one completion run.
struct Closure {
    stack: Vec<ZettelId>,
    visited: HashSet<ZettelId>,
    /// Linked zettel that failed to load or are not public.
    dropped_zettel: HashSet<ZettelId>,
    /// Embedded images whose raw fetch failed. Kept apart from
    /// `dropped_zettel`: visibility never applies to embeds.
    dropped_images: HashSet<ZettelId>,
    has_mermaid: bool,
}

impl Closure {
    fn new(zids: &[ZettelId]) -> Self {
        Self {
            stack: zids.iter().rev().cloned().collect(),
            visited: HashSet::with_capacity(zids.len() + 16),
            dropped_zettel: HashSet::new(),
            dropped_images: HashSet::new(),
            has_mermaid: false,
        }
    }
}

/// Something in a slide's content that completion acts on.
enum Found {
    Zettel(ZettelId),
    Image(ZettelId, String),
    Mermaid,
}

/// Links, embeds and Mermaid blocks of `blocks`, in document order.
fn collect(blocks: &[Block]) -> Vec<Found> {
    let mut found = Vec::new();
    walk_blocks(blocks, &mut |node| match node {
        Node::Block(block) if block.is_mermaid() => found.push(Found::Mermaid),
        Node::Inline(inline) => {
            if let Some(zid) = inline.linked_zettel() {
                found.push(Found::Zettel(zid));
            } else if let Some((zid, syntax)) = inline.embedded_zettel() {
                found.push(Found::Image(zid, syntax.to_string()));
            }
        }
        Node::Block(_) => {}
    });
    found
}

//! HTML encoding of zettel content.
//!
//! [`HtmlEncoder`] turns [`Block`]/[`Inline`] trees into markup. Its options
//! depend on where the content ends up:
//!
//! | | images | zettel links | comments |
//! |---|---|---|---|
//! | zettel page | `/content/{zid}` | `/{zid}` | dropped |
//! | show | `/content/{zid}` | in-deck anchor, else `/{zid}` | kept |
//! | handout | inline `data:` URI | in-deck anchor, else text | dropped |
//!
//! Footnotes are collected while encoding and emitted by
//! [`HtmlEncoder::endnotes`]. Raw HTML from zettel is never passed through.

use super::{TRACING_TARGET, Target, image_mime};
use crate::content::{
    Alignment, Attributes, Block, FormatKind, Inline, ListKind, LiteralKind, RefState, RegionKind,
    SYNTAX_SVG, TableCell, VerbatimKind, plain_text,
};
use crate::slide::{SlideNode, SlideRole};
use crate::slideset::{Image, SlideSet};
use crate::zid::ZettelId;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use maud::{Markup, PreEscaped, html};

/// Key of the attribute that asks for visible spaces in literal text.
const VISIBLE_SPACE: &str = "-";

pub struct HtmlEncoder<'a> {
    set: Option<&'a SlideSet>,
    current: Option<SlideNode<'a>>,
    target: Option<Target>,
    heading_offset: u32,
    embed_images: bool,
    ext_zettel_links: bool,
    write_comments: bool,
    unique: String,
    footnotes: Vec<Vec<Inline>>,
}

impl Default for HtmlEncoder<'_> {
    fn default() -> Self {
        Self {
            set: None,
            current: None,
            target: None,
            heading_offset: 0,
            embed_images: false,
            ext_zettel_links: true,
            write_comments: false,
            unique: String::new(),
            footnotes: Vec::new(),
        }
    }
}

impl<'a> HtmlEncoder<'a> {
    /// Encoder for a standalone zettel page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder for the slides of `set` rendered as `target`.
    pub fn for_target(set: &'a SlideSet, target: Target) -> Self {
        let handout = target == Target::Handout;
        Self {
            set: Some(set),
            target: Some(target),
            embed_images: handout,
            ext_zettel_links: !handout,
            write_comments: !handout,
            ..Self::default()
        }
    }

    /// Shift heading levels, e.g. 1 when a slide title is already `h1`.
    pub fn with_heading_offset(mut self, offset: u32) -> Self {
        self.heading_offset = offset;
        self
    }

    /// Record the links of following content resolve from.
    pub fn set_current(&mut self, node: SlideNode<'a>) {
        self.current = Some(node);
    }

    /// Prefix for footnote and mark ids, unique per slide.
    pub fn set_unique(&mut self, unique: impl Into<String>) {
        self.unique = unique.into();
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    pub fn blocks(&mut self, blocks: &[Block]) -> Markup {
        html! {
            @for block in blocks {
                (self.block(block))
            }
        }
    }

    fn block(&mut self, block: &Block) -> Markup {
        match block {
            Block::Verbatim { content, .. } if block.is_mermaid() => html! {
                div.mermaid { (content) }
            },
            Block::Paragraph(inlines) => html! { p { (self.inlines(inlines)) } },
            Block::Heading {
                level,
                attrs,
                inlines,
            } => {
                let level = (level + self.heading_offset).clamp(1, 6);
                element(&format!("h{level}"), attrs, self.inlines(inlines))
            }
            Block::ThematicBreak => html! { hr; },
            Block::List {
                kind: ListKind::Bullet,
                items,
            } => html! {
                ul { @for item in items { li { (self.blocks(item)) } } }
            },
            Block::List {
                kind: ListKind::Ordered,
                items,
            } => html! {
                ol { @for item in items { li { (self.blocks(item)) } } }
            },
            Block::List {
                kind: ListKind::Quotation,
                items,
            } => self.quotation(items),
            Block::DescriptionList(descriptions) => html! {
                dl {
                    @for description in descriptions {
                        dt { (self.inlines(&description.term)) }
                        @for detail in &description.descriptions {
                            @if !detail.is_empty() {
                                dd { (self.blocks(detail)) }
                            }
                        }
                    }
                }
            },
            Block::Table { header, rows } => html! {
                table {
                    @if !header.is_empty() {
                        thead { (self.row(header, true)) }
                    }
                    @if !rows.is_empty() {
                        tbody { @for row in rows { (self.row(row, false)) } }
                    }
                }
            },
            Block::Region {
                kind,
                attrs,
                blocks,
                cite,
            } => self.region(*kind, attrs, blocks, cite),
            Block::Verbatim {
                kind,
                attrs,
                content,
            } => self.verbatim(*kind, attrs, content),
            Block::Blob {
                syntax,
                title,
                data,
                svg,
            } => blob(syntax, title, data, svg),
            Block::Other(_) => html! {},
        }
    }

    /// Consecutive single-paragraph items share one paragraph.
    fn quotation(&mut self, items: &[Vec<Block>]) -> Markup {
        let mut out = String::new();
        let mut para: Vec<String> = Vec::new();
        for item in items {
            match item.as_slice() {
                [Block::Paragraph(inlines)] => para.push(self.inlines(inlines).into_string()),
                blocks => {
                    flush_paragraph(&mut out, &mut para);
                    out.push_str(&self.blocks(blocks).into_string());
                }
            }
        }
        flush_paragraph(&mut out, &mut para);
        html! { blockquote { (PreEscaped(out)) } }
    }

    fn row(&mut self, cells: &[TableCell], head: bool) -> Markup {
        html! {
            tr {
                @for cell in cells {
                    @let class = align_class(cell.align);
                    @if head {
                        th class=[class] { (self.inlines(&cell.inlines)) }
                    } @else {
                        td class=[class] { (self.inlines(&cell.inlines)) }
                    }
                }
            }
        }
    }

    fn region(
        &mut self,
        kind: RegionKind,
        attrs: &Attributes,
        blocks: &[Block],
        cite: &[Inline],
    ) -> Markup {
        let mut attrs = attrs.clone();
        let default = attrs.remove("");
        let tag = match kind {
            RegionKind::Block => {
                match default.as_deref() {
                    Some(which @ ("show" | "handout" | "both")) => return self.aside(which, blocks),
                    Some(class) => {
                        attrs.add_class(class);
                    }
                    None => {}
                }
                "div"
            }
            RegionKind::Poem => "div",
            RegionKind::Excerpt => "blockquote",
        };
        let body = html! {
            (self.blocks(blocks))
            @if !cite.is_empty() {
                cite { (self.inlines(cite)) }
            }
        };
        element(tag, &attrs, body)
    }

    /// Role-specific region: speaker notes in shows, asides in handouts.
    fn aside(&mut self, which: &str, blocks: &[Block]) -> Markup {
        let class = match (which, self.target.map(Target::role)) {
            ("show" | "both", Some(SlideRole::Show)) => "notes",
            ("handout" | "both", Some(SlideRole::Handout)) => "handout",
            _ => return html! {},
        };
        html! { aside class=(class) { (self.blocks(blocks)) } }
    }

    fn verbatim(&mut self, kind: VerbatimKind, attrs: &Attributes, content: &str) -> Markup {
        match kind {
            VerbatimKind::Code | VerbatimKind::Eval => {
                let mut attrs = attrs.clone();
                let visible = attrs.remove(VISIBLE_SPACE).is_some();
                set_language(&mut attrs);
                html! { pre { (element("code", &attrs, literal_text(content, visible))) } }
            }
            VerbatimKind::Comment if self.write_comments && !content.is_empty() => {
                PreEscaped(format!("<!--\n{}\n-->", comment_safe(content)))
            }
            VerbatimKind::Comment | VerbatimKind::Html => html! {},
        }
    }

    // ========================================================================
    // Inlines
    // ========================================================================

    pub fn inlines(&mut self, inlines: &[Inline]) -> Markup {
        html! {
            @for inline in inlines {
                (self.inline(inline))
            }
        }
    }

    fn inline(&mut self, inline: &Inline) -> Markup {
        match inline {
            Inline::Text(text) => html! { (text) },
            Inline::Space => html! { " " },
            Inline::SoftBreak => html! { "\n" },
            Inline::HardBreak => html! { br; },
            Inline::Tag(tag) => html! { "#" (tag) },
            Inline::Link {
                attrs,
                reference,
                state,
                inlines,
            } => self.link(attrs, reference, state, inlines),
            Inline::Embed {
                attrs,
                reference,
                syntax,
                inlines,
            } => self.embed(attrs, reference, syntax, inlines),
            Inline::EmbedBlob {
                attrs,
                syntax,
                data,
                svg,
                inlines,
            } => match syntax.as_str() {
                "" => html! {},
                SYNTAX_SVG => PreEscaped(svg.clone()),
                _ => {
                    let mut attrs = attrs.clone();
                    attrs.set("src", data_uri(syntax, data));
                    set_title(&mut attrs, inlines);
                    void_element("img", &attrs)
                }
            },
            Inline::Citation { key, inlines, .. } => html! {
                @if !key.is_empty() {
                    (key)
                    @if !inlines.is_empty() { ", " }
                }
                (self.inlines(inlines))
            },
            Inline::Mark {
                fragment, inlines, ..
            } => {
                if fragment.is_empty() {
                    self.inlines(inlines)
                } else {
                    let id = format!("{}{}", self.unique, fragment);
                    html! { a id=(id) { (self.inlines(inlines)) } }
                }
            }
            Inline::Footnote { inlines, .. } => self.footnote(inlines),
            Inline::Format {
                kind,
                attrs,
                inlines,
            } => {
                let mut attrs = attrs.clone();
                if let Some(class) = attrs.remove("") {
                    attrs.add_class(&class);
                }
                element(format_tag(*kind), &attrs, self.inlines(inlines))
            }
            Inline::Literal {
                kind,
                attrs,
                content,
            } => self.literal(*kind, attrs, content),
            Inline::Other(_) => html! {},
        }
    }

    fn link(
        &mut self,
        attrs: &Attributes,
        reference: &str,
        state: &RefState,
        inlines: &[Inline],
    ) -> Markup {
        if reference.is_empty() {
            return self.inlines(inlines);
        }
        let mut attrs = attrs.clone();
        let mut suffix = None;
        match state {
            RefState::External => {
                attrs
                    .set("href", reference)
                    .add_class("external")
                    .set("target", "_blank")
                    .set("rel", "noopener noreferrer");
                suffix = Some("\u{279a}");
            }
            RefState::Zettel => match self.zettel_href(reference) {
                Some(href) if href.starts_with('#') => {
                    attrs.set("href", href);
                }
                Some(href) => {
                    attrs.set("href", href);
                    suffix = Some("\u{2933}");
                }
                None => {}
            },
            RefState::Based | RefState::Hosted | RefState::SelfRef => {
                attrs.set("href", reference);
            }
            RefState::Broken => {
                attrs.add_class("broken");
            }
            RefState::Query | RefState::Unknown(_) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    reference,
                    state = ?state,
                    "link rendered as text"
                );
            }
        }
        let text = if inlines.is_empty() {
            html! { (reference) }
        } else {
            self.inlines(inlines)
        };
        if attrs.is_empty() {
            return text;
        }
        html! {
            (element("a", &attrs, text))
            @if let Some(suffix) = suffix { (suffix) }
        }
    }

    /// Target of a link to another zettel: an anchor if the zettel is a
    /// slide of this rendering, else its page when external links are on.
    fn zettel_href(&self, reference: &str) -> Option<String> {
        let zid = reference.split_once('#').map_or(reference, |(zid, _)| zid);
        let zid = ZettelId::parse(zid)?;
        if let (Some(current), Some(target)) = (self.current, self.target) {
            if let Some(number) = current.find_slide(&zid).and_then(|node| node.number()) {
                return Some(target.anchor(number));
            }
        }
        self.ext_zettel_links.then(|| format!("/{reference}"))
    }

    fn cached_image(&self, zid: Option<&ZettelId>) -> Option<&'a Image> {
        let set = self.set?;
        set.get_image(zid?)
    }

    fn embed(
        &mut self,
        attrs: &Attributes,
        reference: &str,
        syntax: &str,
        inlines: &[Inline],
    ) -> Markup {
        let zid = ZettelId::parse(reference);
        let cached = self.cached_image(zid.as_ref());
        if syntax == SYNTAX_SVG {
            if let Some(image) = cached.filter(|image| image.syntax == SYNTAX_SVG) {
                return PreEscaped(String::from_utf8_lossy(&image.data).into_owned());
            }
            let src = content_url(zid.as_ref(), reference);
            return html! {
                figure { embed type="image/svg+xml" src=(src); }
            };
        }
        let src = match cached {
            Some(image) if self.embed_images => {
                data_uri(&image.syntax, &BASE64.encode(&image.data))
            }
            _ => content_url(zid.as_ref(), reference),
        };
        let mut attrs = attrs.clone();
        attrs.set("src", src);
        set_title(&mut attrs, inlines);
        void_element("img", &attrs)
    }

    fn footnote(&mut self, inlines: &[Inline]) -> Markup {
        self.footnotes.push(inlines.to_vec());
        let n = self.footnotes.len();
        let unique = &self.unique;
        html! {
            sup id={ "fnref:" (unique) (n) } {
                a href={ "#fn:" (unique) (n) } { (n) }
            }
        }
    }

    fn literal(&mut self, kind: LiteralKind, attrs: &Attributes, content: &str) -> Markup {
        if content.is_empty() {
            return html! {};
        }
        let mut attrs = attrs.clone();
        let tag = match kind {
            LiteralKind::Code => {
                set_language(&mut attrs);
                "code"
            }
            LiteralKind::Input => "kbd",
            LiteralKind::Output => "samp",
            LiteralKind::Comment if self.write_comments => {
                return PreEscaped(format!("<!-- {} -->", comment_safe(content)));
            }
            LiteralKind::Comment | LiteralKind::Html => return html! {},
        };
        let visible = attrs.remove(VISIBLE_SPACE).is_some();
        element(tag, &attrs, literal_text(content, visible))
    }

    /// Footnotes collected since the last call, as an ordered list.
    pub fn endnotes(&mut self) -> Markup {
        let notes = std::mem::take(&mut self.footnotes);
        if notes.is_empty() {
            return html! {};
        }
        let unique = self.unique.clone();
        html! {
            ol.endnotes {
                @for (i, note) in notes.iter().enumerate() {
                    @let n = i + 1;
                    li.footnote value=(n) id={ "fn:" (unique) (n) } {
                        (self.inlines(note))
                        " "
                        a href={ "#fnref:" (unique) (n) } { (PreEscaped("&#x21a9;&#xfe0e;")) }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Markup helpers
// ============================================================================

/// Element with arbitrary attributes, which `html!` cannot express.
fn element(tag: &str, attrs: &Attributes, body: Markup) -> Markup {
    PreEscaped(format!(
        "<{tag}{}>{}</{tag}>",
        attributes(attrs),
        body.into_string()
    ))
}

fn void_element(tag: &str, attrs: &Attributes) -> Markup {
    PreEscaped(format!("<{tag}{}>", attributes(attrs)))
}

/// ` key="value"` pairs. The default attribute and keys that are not plain
/// attribute names are skipped.
fn attributes(attrs: &Attributes) -> String {
    attrs
        .iter()
        .filter(|(key, _)| is_attribute_name(key))
        .map(|(key, value)| format!(r#" {key}="{}""#, escape(value)))
        .collect()
}

fn is_attribute_name(key: &str) -> bool {
    key.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

fn escape(s: &str) -> String {
    html! { (s) }.into_string()
}

fn literal_text(content: &str, visible_space: bool) -> Markup {
    if visible_space {
        html! { (content.replace(' ', "\u{2423}")) }
    } else {
        html! { (content) }
    }
}

/// Comments must not contain `--`.
fn comment_safe(text: &str) -> String {
    text.replace("--", "- -")
}

fn flush_paragraph(out: &mut String, para: &mut Vec<String>) {
    if !para.is_empty() {
        out.push_str("<p>");
        out.push_str(&para.join("\n"));
        out.push_str("</p>");
        para.clear();
    }
}

/// The default attribute of code names its language.
fn set_language(attrs: &mut Attributes) {
    if let Some(lang) = attrs.remove("") {
        attrs.add_class(&format!("language-{lang}"));
    }
}

fn set_title(attrs: &mut Attributes, inlines: &[Inline]) {
    let title = plain_text(inlines);
    if !title.is_empty() {
        attrs.set("title", title);
    }
}

fn align_class(align: Alignment) -> Option<&'static str> {
    match align {
        Alignment::Default => None,
        Alignment::Left => Some("left"),
        Alignment::Center => Some("center"),
        Alignment::Right => Some("right"),
    }
}

fn format_tag(kind: FormatKind) -> &'static str {
    match kind {
        FormatKind::Delete => "del",
        FormatKind::Emph => "em",
        FormatKind::Insert => "ins",
        FormatKind::Quote => "q",
        FormatKind::Span => "span",
        FormatKind::Strong => "strong",
        FormatKind::Sub => "sub",
        FormatKind::Super => "sup",
    }
}

fn data_uri(syntax: &str, base64: &str) -> String {
    format!("data:{};base64,{base64}", image_mime(syntax))
}

fn content_url(zid: Option<&ZettelId>, reference: &str) -> String {
    match zid {
        Some(zid) => format!("/content/{zid}"),
        None => reference.to_string(),
    }
}

fn blob(syntax: &str, title: &str, data: &str, svg: &str) -> Markup {
    match syntax {
        "" => html! {},
        SYNTAX_SVG if svg.is_empty() => html! {},
        SYNTAX_SVG => html! { p { (PreEscaped(svg)) } },
        _ if data.is_empty() => html! {},
        _ => {
            let title = (!title.is_empty()).then_some(title);
            html! { p { img src=(data_uri(syntax, data)) title=[title]; } }
        }
    }
}

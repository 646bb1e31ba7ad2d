//! Zettel content tree.
//!
//! The Zettelstore parses zettel markup and hands out the result as a tree of
//! block and inline nodes. This module models that tree as two closed sum
//! types, [`Block`] and [`Inline`]. Only a handful of shapes matter to the
//! slide machinery:
//!
//! | Shape | Used by |
//! |---|---|
//! | [`Block::Heading`] (level 1) | slide splitting |
//! | [`Inline::Link`] with [`RefState::Zettel`] | closure traversal, in-deck anchors |
//! | [`Inline::Embed`] of a zettel | image cache |
//! | [`Block::Verbatim`] of kind [`VerbatimKind::Eval`] with syntax `mermaid` | diagram flag |
//!
//! Everything else is carried along for the renderers and otherwise ignored.
//! Node kinds the decoder does not know end up as `Other` and render as
//! nothing.
//!
//! [`walk_blocks`] visits every node of a tree in document order, which is all
//! the traversal the core needs.

use crate::zid::ZettelId;
use std::collections::BTreeMap;

/// Syntax tag of verbatim blocks that are rendered client-side by Mermaid.
pub const SYNTAX_MERMAID: &str = "mermaid";
/// Syntax tag of SVG images.
pub const SYNTAX_SVG: &str = "svg";

/// Key/value attributes attached to a node.
///
/// The empty key holds the "default" attribute, e.g. the syntax of a
/// verbatim block (`~~~mermaid`) or the kind of a region (`:::show`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes with just a default value.
    pub fn with_default(value: impl Into<String>) -> Self {
        let mut attrs = Self::new();
        attrs.set("", value);
        attrs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The default attribute (empty key).
    pub fn default_value(&self) -> Option<&str> {
        self.get("")
    }

    pub fn has_default(&self) -> bool {
        self.0.contains_key("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Append a CSS class to the `class` attribute.
    pub fn add_class(&mut self, class: &str) -> &mut Self {
        match self.0.get_mut("class") {
            Some(existing) if !existing.is_empty() => {
                existing.push(' ');
                existing.push_str(class);
            }
            _ => {
                self.0.insert("class".to_string(), class.to_string());
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Where a link reference points to, as resolved by the Zettelstore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefState {
    /// Another zettel in the same store.
    Zettel,
    /// A fragment within the current zettel.
    SelfRef,
    /// A URL on the web.
    External,
    /// A path on the Zettelstore's host.
    Hosted,
    /// A path relative to the Zettelstore's base URL.
    Based,
    /// A zettel that does not exist.
    Broken,
    /// A search query.
    Query,
    /// Anything this build does not know about.
    Unknown(String),
}

impl RefState {
    pub fn parse(s: &str) -> Self {
        match s {
            "zettel" | "found" => Self::Zettel,
            "self" => Self::SelfRef,
            "external" => Self::External,
            "local" | "hosted" => Self::Hosted,
            "based" => Self::Based,
            "broken" => Self::Broken,
            "query" => Self::Query,
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
    Quotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Block,
    Poem,
    Excerpt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbatimKind {
    Code,
    Eval,
    Comment,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Delete,
    Emph,
    Insert,
    Quote,
    Span,
    Strong,
    Sub,
    Super,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Code,
    Comment,
    Input,
    Output,
    Html,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Default,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub align: Alignment,
    pub inlines: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub term: Vec<Inline>,
    pub descriptions: Vec<Vec<Block>>,
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Heading {
        /// 0 when the encoding carried no usable level.
        level: u32,
        attrs: Attributes,
        inlines: Vec<Inline>,
    },
    ThematicBreak,
    List {
        kind: ListKind,
        items: Vec<Vec<Block>>,
    },
    DescriptionList(Vec<Description>),
    Table {
        header: Vec<TableCell>,
        rows: Vec<Vec<TableCell>>,
    },
    Region {
        kind: RegionKind,
        attrs: Attributes,
        blocks: Vec<Block>,
        cite: Vec<Inline>,
    },
    Verbatim {
        kind: VerbatimKind,
        attrs: Attributes,
        content: String,
    },
    /// Binary object stored in a zettel, already base64 encoded.
    Blob {
        syntax: String,
        title: String,
        data: String,
        svg: String,
    },
    Other(String),
}

/// Inline node.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Space,
    SoftBreak,
    HardBreak,
    Tag(String),
    Link {
        attrs: Attributes,
        reference: String,
        state: RefState,
        inlines: Vec<Inline>,
    },
    Embed {
        attrs: Attributes,
        reference: String,
        syntax: String,
        inlines: Vec<Inline>,
    },
    EmbedBlob {
        attrs: Attributes,
        syntax: String,
        data: String,
        svg: String,
        inlines: Vec<Inline>,
    },
    Citation {
        attrs: Attributes,
        key: String,
        inlines: Vec<Inline>,
    },
    Mark {
        mark: String,
        fragment: String,
        inlines: Vec<Inline>,
    },
    Footnote {
        attrs: Attributes,
        inlines: Vec<Inline>,
    },
    Format {
        kind: FormatKind,
        attrs: Attributes,
        inlines: Vec<Inline>,
    },
    Literal {
        kind: LiteralKind,
        attrs: Attributes,
        content: String,
    },
    Other(String),
}

impl Inline {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Link to another zettel of the same store.
    pub fn zettel_link(zid: &ZettelId, inlines: Vec<Inline>) -> Self {
        Self::Link {
            attrs: Attributes::new(),
            reference: zid.to_string(),
            state: RefState::Zettel,
            inlines,
        }
    }

    /// Embedded zettel image.
    pub fn embed(zid: &ZettelId, syntax: impl Into<String>) -> Self {
        Self::Embed {
            attrs: Attributes::new(),
            reference: zid.to_string(),
            syntax: syntax.into(),
            inlines: Vec::new(),
        }
    }

    /// The target zettel of an internal link, if this is one.
    pub fn linked_zettel(&self) -> Option<ZettelId> {
        match self {
            Self::Link {
                reference,
                state: RefState::Zettel,
                ..
            } => ZettelId::parse(reference),
            _ => None,
        }
    }

    /// The embedded zettel and its syntax, if this embeds one.
    pub fn embedded_zettel(&self) -> Option<(ZettelId, &str)> {
        match self {
            Self::Embed {
                reference, syntax, ..
            } => ZettelId::parse(reference).map(|zid| (zid, syntax.as_str())),
            _ => None,
        }
    }
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph(vec![Inline::text(text)])
    }

    pub fn heading(level: u32, text: impl Into<String>) -> Self {
        Self::Heading {
            level,
            attrs: Attributes::new(),
            inlines: vec![Inline::text(text)],
        }
    }

    /// Title of a level-1 heading that starts a new split child.
    pub fn split_title(&self) -> Option<&[Inline]> {
        match self {
            Self::Heading { level: 1, inlines, .. } if !inlines.is_empty() => Some(inlines),
            _ => None,
        }
    }

    /// True for an eval block written in Mermaid syntax.
    pub fn is_mermaid(&self) -> bool {
        matches!(
            self,
            Self::Verbatim { kind: VerbatimKind::Eval, attrs, .. }
                if attrs.default_value() == Some(SYNTAX_MERMAID)
        )
    }
}

/// A node reached while walking a content tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Block(&'a Block),
    Inline(&'a Inline),
}

/// Visit every block and inline node in document order, parents first.
pub fn walk_blocks<'a>(blocks: &'a [Block], visit: &mut impl FnMut(Node<'a>)) {
    for block in blocks {
        walk_block(block, visit);
    }
}

/// Visit every inline node in document order, parents first.
pub fn walk_inlines<'a>(inlines: &'a [Inline], visit: &mut impl FnMut(Node<'a>)) {
    for inline in inlines {
        walk_inline(inline, visit);
    }
}

fn walk_block<'a>(block: &'a Block, visit: &mut impl FnMut(Node<'a>)) {
    visit(Node::Block(block));
    match block {
        Block::Paragraph(inlines) | Block::Heading { inlines, .. } => walk_inlines(inlines, visit),
        Block::List { items, .. } => {
            for item in items {
                walk_blocks(item, visit);
            }
        }
        Block::DescriptionList(descrs) => {
            for descr in descrs {
                walk_inlines(&descr.term, visit);
                for blocks in &descr.descriptions {
                    walk_blocks(blocks, visit);
                }
            }
        }
        Block::Table { header, rows } => {
            for cell in header.iter().chain(rows.iter().flatten()) {
                walk_inlines(&cell.inlines, visit);
            }
        }
        Block::Region { blocks, cite, .. } => {
            walk_blocks(blocks, visit);
            walk_inlines(cite, visit);
        }
        Block::ThematicBreak | Block::Verbatim { .. } | Block::Blob { .. } | Block::Other(_) => {}
    }
}

fn walk_inline<'a>(inline: &'a Inline, visit: &mut impl FnMut(Node<'a>)) {
    visit(Node::Inline(inline));
    match inline {
        Inline::Link { inlines, .. }
        | Inline::Embed { inlines, .. }
        | Inline::EmbedBlob { inlines, .. }
        | Inline::Citation { inlines, .. }
        | Inline::Mark { inlines, .. }
        | Inline::Footnote { inlines, .. }
        | Inline::Format { inlines, .. } => walk_inlines(inlines, visit),
        Inline::Text(_)
        | Inline::Space
        | Inline::SoftBreak
        | Inline::HardBreak
        | Inline::Tag(_)
        | Inline::Literal { .. }
        | Inline::Other(_) => {}
    }
}

/// Flatten inlines to plain text: words and tags, breaks become spaces.
///
/// Used for `<title>` elements, image titles and anywhere markup is not
/// allowed.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    walk_inlines(inlines, &mut |node| match node {
        Node::Inline(Inline::Text(s)) | Node::Inline(Inline::Tag(s)) => out.push_str(s),
        Node::Inline(Inline::Space | Inline::SoftBreak | Inline::HardBreak) => out.push(' '),
        Node::Inline(Inline::Literal { content, .. }) => out.push_str(content),
        _ => {}
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<Inline> {
        let mut out = Vec::new();
        for (i, w) in s.split(' ').enumerate() {
            if i > 0 {
                out.push(Inline::Space);
            }
            out.push(Inline::text(w));
        }
        out
    }

    #[test]
    fn plain_text_joins_words_with_spaces() {
        assert_eq!(plain_text(&words("Hello big world")), "Hello big world");
    }

    #[test]
    fn plain_text_descends_into_formatting() {
        let inlines = vec![
            Inline::text("a"),
            Inline::Space,
            Inline::Format {
                kind: FormatKind::Strong,
                attrs: Attributes::new(),
                inlines: words("bold text"),
            },
        ];
        assert_eq!(plain_text(&inlines), "a bold text");
    }

    #[test]
    fn walk_reaches_links_nested_in_lists_and_regions() {
        let target = ZettelId::new("20230101000000");
        let blocks = vec![Block::List {
            kind: ListKind::Bullet,
            items: vec![vec![Block::Region {
                kind: RegionKind::Block,
                attrs: Attributes::new(),
                blocks: vec![Block::Paragraph(vec![Inline::zettel_link(
                    &target,
                    words("see there"),
                )])],
                cite: vec![],
            }]],
        }];

        let mut found = Vec::new();
        walk_blocks(&blocks, &mut |node| {
            if let Node::Inline(inline) = node
                && let Some(zid) = inline.linked_zettel()
            {
                found.push(zid);
            }
        });
        assert_eq!(found, vec![target]);
    }

    #[test]
    fn walk_visits_table_cells() {
        let blocks = vec![Block::Table {
            header: vec![TableCell {
                align: Alignment::Default,
                inlines: vec![Inline::text("h")],
            }],
            rows: vec![vec![TableCell {
                align: Alignment::Right,
                inlines: vec![Inline::text("c")],
            }]],
        }];
        let mut texts = Vec::new();
        walk_blocks(&blocks, &mut |node| {
            if let Node::Inline(Inline::Text(s)) = node {
                texts.push(s.clone());
            }
        });
        assert_eq!(texts, vec!["h", "c"]);
    }

    #[test]
    fn external_link_is_not_a_zettel_link() {
        let link = Inline::Link {
            attrs: Attributes::new(),
            reference: "20230101000000".to_string(),
            state: RefState::External,
            inlines: vec![],
        };
        assert_eq!(link.linked_zettel(), None);
    }

    #[test]
    fn embed_needs_valid_zid() {
        let embed = Inline::Embed {
            attrs: Attributes::new(),
            reference: "https://example.com/a.png".to_string(),
            syntax: "png".to_string(),
            inlines: vec![],
        };
        assert_eq!(embed.embedded_zettel(), None);

        let zid = ZettelId::new("20230101000000");
        let embed = Inline::embed(&zid, "png");
        assert_eq!(embed.embedded_zettel(), Some((zid, "png")));
    }

    #[test]
    fn only_level_one_headings_with_text_split() {
        assert!(Block::heading(1, "Intro").split_title().is_some());
        assert!(Block::heading(2, "Sub").split_title().is_none());
        let empty = Block::Heading {
            level: 1,
            attrs: Attributes::new(),
            inlines: vec![],
        };
        assert!(empty.split_title().is_none());
    }

    #[test]
    fn mermaid_detection_requires_eval_kind() {
        let eval = Block::Verbatim {
            kind: VerbatimKind::Eval,
            attrs: Attributes::with_default("mermaid"),
            content: "graph TD; A-->B".to_string(),
        };
        let code = Block::Verbatim {
            kind: VerbatimKind::Code,
            attrs: Attributes::with_default("mermaid"),
            content: String::new(),
        };
        assert!(eval.is_mermaid());
        assert!(!code.is_mermaid());
    }

    #[test]
    fn add_class_appends() {
        let mut attrs = Attributes::new();
        attrs.add_class("a").add_class("b");
        assert_eq!(attrs.get("class"), Some("a b"));
    }

    #[test]
    fn ref_state_parses_known_values() {
        assert_eq!(RefState::parse("zettel"), RefState::Zettel);
        assert_eq!(RefState::parse("external"), RefState::External);
        assert_eq!(
            RefState::parse("mystery"),
            RefState::Unknown("mystery".to_string())
        );
    }
}

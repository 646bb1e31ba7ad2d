//! Slide shows and handouts of a completed slide set.
//!
//! Shows render one section per split part of every show slide, so a zettel
//! with level-1 headings becomes several slides. The handout renders one
//! entry per handout slide with its full content; entries of zettel that
//! are also shown carry the show numbers they occupy.

use super::{
    HtmlEncoder, RenderError, Target, base_document, colophon, copyright_meta, ensure_completed,
    mermaid_scripts, page_style, slide_offset,
};
use crate::content::{Inline, plain_text};
use crate::slide::{SlideNode, SlideRole};
use crate::slideset::SlideSet;
use maud::{Markup, PreEscaped, html};

const REVEAL_CSS: &str = "https://cdn.jsdelivr.net/npm/reveal.js@5/dist/reveal.css";
const REVEAL_THEME: &str = "https://cdn.jsdelivr.net/npm/reveal.js@5/dist/theme/white.css";
const REVEAL_JS: &str = "https://cdn.jsdelivr.net/npm/reveal.js@5/dist/reveal.js";
const REVEAL_NOTES: &str = "https://cdn.jsdelivr.net/npm/reveal.js@5/plugin/notes/notes.js";
// One-based hashes keep `#/n` equal to the slide number.
const REVEAL_INIT: &str =
    "Reveal.initialize({ hash: true, hashOneBasedIndex: true, plugins: [RevealNotes] });";

const SLIDY_CSS: &str = "https://www.w3.org/Talks/Tools/Slidy2/styles/slidy.css";
const SLIDY_JS: &str = "https://www.w3.org/Talks/Tools/Slidy2/scripts/slidy.js";

/// Renders a Reveal.js presentation.
pub fn render_reveal(set: &SlideSet) -> Result<Markup, RenderError> {
    ensure_completed(set)?;
    let title = set.title();
    let seq = set.slides(SlideRole::Show, slide_offset(title.is_some()));
    let mut enc = HtmlEncoder::for_target(set, Target::Reveal).with_heading_offset(1);
    let copyright = set.copyright();
    let license = set.license();

    let head = html! {
        (copyright_meta(copyright.as_deref()))
        link rel="stylesheet" href=(REVEAL_CSS);
        link rel="stylesheet" href=(REVEAL_THEME);
    };
    let content = html! {
        div.reveal {
            div.slides {
                @if let Some(title) = &title {
                    section.titlepage {
                        (title_page(&mut enc, set, title))
                        (colophon(copyright.as_deref(), license.as_deref()))
                    }
                }
                @for node in seq.iter() {
                    @for part in node.children() {
                        section lang=[part.slide().lang()] {
                            (slide_body(&mut enc, node, part))
                        }
                    }
                }
            }
        }
        script src=(REVEAL_JS) {}
        script src=(REVEAL_NOTES) {}
        script { (PreEscaped(REVEAL_INIT)) }
        (mermaid_scripts(set.has_mermaid()))
    };
    let lang = set.lang();
    Ok(base_document(
        &document_title(set, title.as_deref()),
        lang.as_deref(),
        head,
        None,
        content,
    ))
}

/// Renders a Slidy presentation.
pub fn render_slidy(set: &SlideSet) -> Result<Markup, RenderError> {
    ensure_completed(set)?;
    let title = set.title();
    let seq = set.slides(SlideRole::Show, slide_offset(title.is_some()));
    let mut enc = HtmlEncoder::for_target(set, Target::Slidy).with_heading_offset(1);
    let copyright = set.copyright();

    let head = html! {
        (copyright_meta(copyright.as_deref()))
        link rel="stylesheet" type="text/css" media="screen, projection, print" href=(SLIDY_CSS);
    };
    let content = html! {
        @if let Some(title) = &title {
            div.slide.titlepage {
                (title_page(&mut enc, set, title))
            }
        }
        @for node in seq.iter() {
            @for part in node.children() {
                div.slide lang=[part.slide().lang()] {
                    (slide_body(&mut enc, node, part))
                }
            }
        }
        script src=(SLIDY_JS) charset="utf-8" {}
        (mermaid_scripts(set.has_mermaid()))
    };
    let lang = set.lang();
    Ok(base_document(
        &document_title(set, title.as_deref()),
        lang.as_deref(),
        head,
        None,
        content,
    ))
}

/// Renders a printable handout.
pub fn render_handout(set: &SlideSet) -> Result<Markup, RenderError> {
    ensure_completed(set)?;
    let title = set.title();
    let seq = set.slides(SlideRole::Handout, slide_offset(title.is_some()));
    let mut enc = HtmlEncoder::for_target(set, Target::Handout).with_heading_offset(1);
    let copyright = set.copyright();
    let license = set.license();

    let content = html! {
        header.titlepage {
            @if let Some(title) = &title {
                (title_page(&mut enc, set, title))
            } @else {
                h1.title { (set.zid()) }
            }
        }
        main {
            @for node in seq.iter() {
                @let number = node.number().unwrap_or_default();
                section.handout-slide id={ "(" (number) ")" } lang=[node.slide().lang()] {
                    (handout_entry(&mut enc, node, number))
                }
            }
        }
        (colophon(copyright.as_deref(), license.as_deref()))
        (mermaid_scripts(set.has_mermaid()))
    };
    let head = html! {
        (copyright_meta(copyright.as_deref()))
        (page_style())
    };
    let lang = set.lang();
    Ok(base_document(
        &document_title(set, title.as_deref()),
        lang.as_deref(),
        head,
        Some("handout"),
        content,
    ))
}

/// "Slide n" or "Slides n–m" for a handout entry that is also shown.
fn slide_caption(range: Option<(usize, usize)>) -> Option<String> {
    match range? {
        (first, last) if first == last => Some(format!("Slide {first}")),
        (first, last) => Some(format!("Slides {first}–{last}")),
    }
}

fn document_title(set: &SlideSet, title: Option<&[Inline]>) -> String {
    title.map_or_else(|| set.zid().to_string(), plain_text)
}

fn title_page(enc: &mut HtmlEncoder<'_>, set: &SlideSet, title: &[Inline]) -> Markup {
    html! {
        h1.title { (enc.inlines(title)) }
        @if let Some(subtitle) = set.subtitle() {
            p.subtitle { (enc.inlines(&subtitle)) }
        }
        @if let Some(author) = set.author() {
            p.author { (author) }
        }
    }
}

/// One show slide: a split part, with links resolved from its record.
fn slide_body<'a>(enc: &mut HtmlEncoder<'a>, node: SlideNode<'a>, part: SlideNode<'a>) -> Markup {
    enc.set_current(node);
    enc.set_unique(format!("{}:", part.slide_no().unwrap_or_default()));
    let slide = part.slide();
    html! {
        h1 { (enc.inlines(slide.title())) }
        (enc.blocks(slide.content()))
        (enc.endnotes())
    }
}

fn handout_entry<'a>(enc: &mut HtmlEncoder<'a>, node: SlideNode<'a>, number: usize) -> Markup {
    enc.set_current(node);
    enc.set_unique(format!("{number}:"));
    let slide = node.slide();
    html! {
        h1 { (enc.inlines(slide.title())) }
        @if let Some(caption) = slide_caption(node.slide_no_range()) {
            p.slide-caption { (caption) }
        }
        (enc.blocks(slide.content()))
        (enc.endnotes())
    }
}

//! HTML output.
//!
//! Renderers consume assembled data and emit markup; they never fetch. Every
//! slide renderer requires a completed [`SlideSet`] because the image cache
//! and the Mermaid flag are only stable after completion.
//!
//! ## Pages
//!
//! | Renderer | Input | Route |
//! |---|---|---|
//! | [`render_zettel`] | one zettel | `/{zid}` |
//! | [`render_toc`] | order of a slide-set zettel | `/{zid}` |
//! | [`render_list`] | zettel search result | `/{c}?{query}` |
//! | [`render_reveal`] | completed slide set | `/reveal/{zid}` |
//! | [`render_slidy`] | completed slide set | `/slidy/{zid}` |
//! | [`render_handout`] | completed slide set | `/handout/{zid}` |
//!
//! ## Numbering
//!
//! Shows, handouts and tables of contents agree on slide numbers: the title
//! page is number 1 when the set has a title, so the first slide is 2.
//! Otherwise numbering starts at 1. See [`slide_offset`].
//!
//! Static CSS for the non-show pages is embedded at compile time from
//! `static/presenter.css`. Reveal.js, Slidy and Mermaid are loaded from
//! their CDNs.

mod html;
mod pages;
mod slides;

pub use html::HtmlEncoder;
pub use pages::{render_error, render_list, render_toc, render_zettel};
pub use slides::{render_handout, render_reveal, render_slidy};

use crate::content::SYNTAX_SVG;
use crate::slide::SlideRole;
use crate::slideset::SlideSet;
use crate::zid::ZettelId;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use thiserror::Error;

/// Tracing target for rendering.
pub const TRACING_TARGET: &str = "zettel_presenter::render";

const CSS: &str = include_str!("../../static/presenter.css");

const MERMAID_JS: &str = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("slide set {0} is not completed")]
    Incomplete(ZettelId),
}

/// What a slide set is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Reveal,
    Slidy,
    Handout,
}

impl Target {
    pub fn role(self) -> SlideRole {
        match self {
            Self::Reveal | Self::Slidy => SlideRole::Show,
            Self::Handout => SlideRole::Handout,
        }
    }

    /// In-page anchor of slide `number`.
    pub fn anchor(self, number: usize) -> String {
        match self {
            Self::Reveal => format!("#/{number}"),
            Self::Slidy | Self::Handout => format!("#({number})"),
        }
    }
}

/// Number of the first slide: 2 if a title page precedes it, else 1.
pub fn slide_offset(has_title: bool) -> usize {
    if has_title { 2 } else { 1 }
}

/// MIME type of an image with zettel syntax `syntax`.
pub fn image_mime(syntax: &str) -> String {
    match syntax {
        SYNTAX_SVG => "image/svg+xml".to_string(),
        "jpg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    }
}

fn ensure_completed(set: &SlideSet) -> Result<(), RenderError> {
    if set.is_completed() {
        Ok(())
    } else {
        Err(RenderError::Incomplete(set.zid().clone()))
    }
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(
    title: &str,
    lang: Option<&str>,
    head: Markup,
    body_class: Option<&str>,
    content: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang=[lang] {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                (head)
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

fn page_style() -> Markup {
    html! { style { (PreEscaped(CSS)) } }
}

fn copyright_meta(copyright: Option<&str>) -> Markup {
    html! {
        @if let Some(copyright) = copyright {
            meta name="copyright" content=(copyright);
        }
    }
}

fn mermaid_scripts(enabled: bool) -> Markup {
    html! {
        @if enabled {
            script src=(MERMAID_JS) {}
            script { "mermaid.initialize({ startOnLoad: true });" }
        }
    }
}

fn colophon(copyright: Option<&str>, license: Option<&str>) -> Markup {
    html! {
        @if copyright.is_some() || license.is_some() {
            footer.colophon {
                @if let Some(copyright) = copyright {
                    p.copyright { (copyright) }
                }
                @if let Some(license) = license {
                    p.license { (license) }
                }
            }
        }
    }
}

//! Plain pages: a single zettel, the table of contents of a slide set, and
//! zettel search results.

use super::{HtmlEncoder, base_document, page_style, slide_offset};
use crate::content::plain_text;
use crate::meta::{self, KEY_LANG, KEY_SUB_TITLE};
use crate::source::{Zettel, ZettelOrder, ZettelRef};
use maud::{Markup, html};

/// Renders a zettel as a standalone page.
pub fn render_zettel(zettel: &Zettel) -> Markup {
    let title = meta::title_or_zid(&zettel.meta, &zettel.zid);
    let lang = zettel.meta.text(KEY_LANG);
    let mut enc = HtmlEncoder::new().with_heading_offset(1);
    let content = html! {
        main.zettel {
            h1 { (enc.inlines(&title)) }
            (enc.blocks(&zettel.content))
            (enc.endnotes())
        }
    };
    base_document(
        &plain_text(&title),
        lang.as_deref(),
        page_style(),
        None,
        content,
    )
}

/// Renders the table of contents of a slide-set zettel.
///
/// Entries link into the Slidy show. Their numbers count a title page
/// when the set has a title, matching the show's own numbering of the
/// first section of each listed zettel.
pub fn render_toc(order: &ZettelOrder) -> Markup {
    let title = meta::slide_title(&order.meta);
    let subtitle = order.meta.inlines(KEY_SUB_TITLE);
    let lang = order.meta.text(KEY_LANG);
    let offset = slide_offset(title.is_some());
    let zid = &order.zid;
    let mut enc = HtmlEncoder::new();

    let page_title = title
        .as_deref()
        .map(plain_text)
        .unwrap_or_else(|| zid.to_string());
    let content = html! {
        main.toc {
            @if let Some(title) = &title {
                h1 { (enc.inlines(title)) }
                @if let Some(subtitle) = &subtitle {
                    h2.subtitle { (enc.inlines(subtitle)) }
                }
            }
            p.start-links {
                a href={ "/slidy/" (zid) } { "Start" }
                a href={ "/reveal/" (zid) } { "Start (Reveal.js)" }
                a href={ "/handout/" (zid) } { "Handout" }
            }
            ol {
                @for (i, entry) in order.list.iter().enumerate() {
                    li {
                        a href={ "/slidy/" (zid) "#(" (i + offset) ")" } {
                            (enc.inlines(&meta::slide_title_or_zid(&entry.meta, &entry.zid)))
                        }
                    }
                }
            }
        }
    };
    base_document(&page_title, lang.as_deref(), page_style(), None, content)
}

/// Renders the result of a zettel search as links to the zettel pages.
///
/// Entries are titled `title → zid`; slide titles are ignored here.
pub fn render_list(heading: &str, list: &[ZettelRef]) -> Markup {
    let mut enc = HtmlEncoder::new();
    let content = html! {
        main.list {
            h1 { (heading) }
            @if list.is_empty() {
                p { "No zettel found." }
            } @else {
                ul {
                    @for entry in list {
                        li {
                            a href={ "/" (entry.zid) } {
                                (enc.inlines(&meta::title_or_zid(&entry.meta, &entry.zid)))
                            }
                        }
                    }
                }
            }
        }
    };
    base_document(heading, None, page_style(), None, content)
}

/// Minimal page for a failed request.
pub fn render_error(status: &str, message: &str) -> Markup {
    let content = html! {
        main.error {
            h1 { (status) }
            p { (message) }
        }
    };
    base_document(status, None, page_style(), None, content)
}

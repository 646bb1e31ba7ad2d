//! # Zettel Presenter
//!
//! Serves slide shows and handouts assembled from a Zettelstore. A slide set
//! is a zettel whose content lists the zettel of a presentation in order;
//! the presenter fetches them, splits them into slides, follows their links
//! to pull in reference material, and renders the result as a Reveal.js
//! show, a Slidy show, or a printable handout.
//!
//! # Request Pipeline
//!
//! Every slide-set request runs the same three steps on a fresh set:
//!
//! ```text
//! 1. Load      fetch order + listed zettel   →  SlideSet (explicit slides)
//! 2. Complete  walk links and embeds         →  SlideSet (closure, images)
//! 3. Render    role-specific numbering       →  HTML
//! ```
//!
//! Nothing is cached between requests. The Zettelstore stays the single
//! source of truth and an edited zettel shows up on the next reload.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`zid`] | `ZettelId` newtype and well-known identifiers |
//! | [`content`] | Content tree (`Block`, `Inline`), attributes, traversal, plain text |
//! | [`meta`] | Zettel metadata and title fallback chains |
//! | [`zjson`] | Decoder for the Zettelstore ZJSON encoding |
//! | [`source`] | `ContentSource` trait and the zettel data it returns |
//! | [`client`] | `ContentSource` over the Zettelstore HTTP API |
//! | [`slide`] | Slides, splitting at level-1 headings, numbered sequences |
//! | [`slideset`] | Slide-set assembly and completion under cancellation |
//! | [`config`] | Layered `config.toml` loading, validation, config zettel overlay |
//! | [`render`] | HTML encoder and page renderers using Maud |
//! | [`server`] | `axum` routes and error responses |
//!
//! # Design Decisions
//!
//! ## Sources Behind a Trait
//!
//! Slide-set assembly only sees [`source::ContentSource`]. The HTTP client is
//! one implementation; tests use an in-memory source that records its
//! calls, so assembly logic is exercised without a network.
//!
//! ## Shared Slides, Fresh Numbers
//!
//! A zettel listed twice in a slide set is one slide appearing twice.
//! Numbering depends on whether a show or a handout is rendered, so it is
//! never stored on the slide: [`slideset::SlideSet::slides`] computes a new
//! [`slide::SlideSequence`] per render.
//!
//! ## Bounded Requests
//!
//! Completion can fan out over many zettel. Each request carries a
//! cancellation token tied to a configurable budget, and every fetch races
//! it. A cancelled set is never rendered.

pub mod client;
pub mod config;
pub mod content;
pub mod meta;
pub mod render;
pub mod server;
pub mod slide;
pub mod slideset;
pub mod source;
pub mod zid;
pub mod zjson;

#[cfg(test)]
pub(crate) mod test_helpers;

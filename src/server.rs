//! HTTP front end.
//!
//! ```text
//! GET /                  home zettel
//! GET /{zid}             zettel page, or table of contents of a slide set
//! GET /reveal/{zid}      Reveal.js show
//! GET /slidy/{zid}       Slidy show
//! GET /handout/{zid}     printable handout
//! GET /content/{zid}     raw zettel content, e.g. images
//! GET /{c}?{query}       zettel list; `c` is any single character up to `z`
//! ```
//!
//! Every slide-set request assembles its own [`SlideSet`] under a
//! cancellation token. The token fires when the configured request budget
//! runs out or when the request itself is dropped, whichever comes first.

use crate::config::PresenterConfig;
use crate::meta::{KEY_ROLE, KEY_SYNTAX};
use crate::render::{
    self, RenderError, image_mime, render_handout, render_list, render_reveal, render_slidy,
    render_toc, render_zettel,
};
use crate::slideset::{SlideSet, SlideSetError};
use crate::source::{ContentSource, SourceError};
use crate::zid::ZettelId;
use axum::Router;
use axum::extract::{Path, RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use maud::Markup;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix;
use tokio_util::sync::CancellationToken;

/// Tracing target for request handling.
pub const TRACING_TARGET: &str = "zettel_presenter::server";

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0:?} is not a zettel identifier")]
    InvalidZid(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    SlideSet(#[from] SlideSetError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidZid(_) => StatusCode::NOT_FOUND,
            Self::Source(err) | Self::SlideSet(SlideSetError::Root { source: err, .. })
                if err.is_not_found() =>
            {
                StatusCode::NOT_FOUND
            }
            Self::Source(_) | Self::SlideSet(SlideSetError::Root { .. }) => StatusCode::BAD_GATEWAY,
            Self::SlideSet(SlideSetError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::SlideSet(SlideSetError::MissingSlide(_)) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                target: TRACING_TARGET,
                status = status.as_u16(),
                error = %self,
                "request failed"
            );
        } else {
            tracing::debug!(
                target: TRACING_TARGET,
                status = status.as_u16(),
                error = %self,
                "request rejected"
            );
        }
        let title = status.to_string();
        let page = render::render_error(&title, &self.to_string());
        (status, Html(page.into_string())).into_response()
    }
}

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    source: Arc<dyn ContentSource>,
    config: Arc<PresenterConfig>,
}

impl AppState {
    pub fn new(source: Arc<dyn ContentSource>, config: PresenterConfig) -> Self {
        Self {
            source,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/{zid}", get(zettel))
        .route("/reveal/{zid}", get(reveal))
        .route("/slidy/{zid}", get(slidy))
        .route("/handout/{zid}", get(handout))
        .route("/content/{zid}", get(content))
        .with_state(state)
}

fn parse_zid(value: &str) -> Result<ZettelId, ServerError> {
    ZettelId::parse(value).ok_or_else(|| ServerError::InvalidZid(value.to_string()))
}

fn page(markup: Markup) -> Html<String> {
    Html(markup.into_string())
}

// ============================================================================
// Handlers
// ============================================================================

async fn home(State(state): State<AppState>) -> Result<Html<String>, ServerError> {
    show_zettel(&state, ZettelId::default_home()).await
}

/// A zettel id shows that zettel; a single character lists the zettel
/// matching the query string.
async fn zettel(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Html<String>, ServerError> {
    if let Some(zid) = ZettelId::parse(&segment) {
        return show_zettel(&state, zid).await;
    }
    if is_list_segment(&segment) {
        return show_list(&state, query.as_deref().unwrap_or_default()).await;
    }
    Err(ServerError::InvalidZid(segment))
}

fn is_list_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c > ' ' && c <= 'z')
}

async fn show_list(state: &AppState, query: &str) -> Result<Html<String>, ServerError> {
    let list = state.source.fetch_list(query).await?;
    tracing::debug!(
        target: TRACING_TARGET,
        query,
        found = list.len(),
        "listed zettel"
    );
    Ok(page(render_list(&list_heading(query), &list)))
}

/// Human-readable form of a URL-encoded query, e.g. `role=slideset`.
fn list_heading(query: &str) -> String {
    let terms: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| {
            if value.is_empty() {
                key.into_owned()
            } else {
                format!("{key}={value}")
            }
        })
        .collect();
    if terms.is_empty() {
        "All zettel".to_string()
    } else {
        terms.join(" ")
    }
}

/// Slide-set zettel get their table of contents, everything else is shown
/// as is. A slide set whose order cannot be read falls back to its plain
/// zettel page.
async fn show_zettel(state: &AppState, zid: ZettelId) -> Result<Html<String>, ServerError> {
    let meta = state.source.fetch_meta(&zid).await?;
    if meta.text(KEY_ROLE).as_deref() == Some(state.config.slides.slideset_role.as_str()) {
        match state.source.fetch_order(&zid).await {
            Ok(order) => return Ok(page(render_toc(&order))),
            Err(err) => tracing::warn!(
                target: TRACING_TARGET,
                zid = %zid,
                error = %err,
                "cannot read slide-set order, showing zettel instead"
            ),
        }
    }
    let zettel = state.source.fetch_zettel(&zid).await?;
    Ok(page(render_zettel(&zettel)))
}

async fn reveal(
    State(state): State<AppState>,
    Path(zid): Path<String>,
) -> Result<Html<String>, ServerError> {
    let set = assemble(&state, &zid).await?;
    Ok(page(render_reveal(&set)?))
}

async fn slidy(
    State(state): State<AppState>,
    Path(zid): Path<String>,
) -> Result<Html<String>, ServerError> {
    let set = assemble(&state, &zid).await?;
    Ok(page(render_slidy(&set)?))
}

async fn handout(
    State(state): State<AppState>,
    Path(zid): Path<String>,
) -> Result<Html<String>, ServerError> {
    let set = assemble(&state, &zid).await?;
    Ok(page(render_handout(&set)?))
}

async fn content(
    State(state): State<AppState>,
    Path(zid): Path<String>,
) -> Result<Response, ServerError> {
    let zid = parse_zid(&zid)?;
    let data = state.source.fetch_raw(&zid).await?;
    let syntax = match state.source.fetch_meta(&zid).await {
        Ok(meta) => meta.text(KEY_SYNTAX),
        Err(err) => {
            tracing::debug!(
                target: TRACING_TARGET,
                zid = %zid,
                error = %err,
                "no metadata for content, sending octet stream"
            );
            None
        }
    };
    let content_type = syntax
        .as_deref()
        .and_then(image_content_type)
        .unwrap_or_else(|| OCTET_STREAM.to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

/// Content type for raw zettel content of `syntax`, if it is an image.
fn image_content_type(syntax: &str) -> Option<String> {
    match syntax {
        "gif" | "jpeg" | "jpg" | "png" | "svg" | "webp" => Some(image_mime(syntax)),
        _ => None,
    }
}

// ============================================================================
// Slide-set assembly
// ============================================================================

/// Load and complete the slide set `zid` within the request budget.
async fn assemble(state: &AppState, zid: &str) -> Result<SlideSet, ServerError> {
    let zid = parse_zid(zid)?;
    let token = CancellationToken::new();
    // Fires on return and on a dropped request, which also stops the timer.
    let _cancel_on_drop = token.clone().drop_guard();
    let budget = state.config.zettelstore.request_budget();
    tokio::spawn({
        let token = token.clone();
        async move {
            tokio::select! {
                () = tokio::time::sleep(budget) => token.cancel(),
                () = token.cancelled() => {}
            }
        }
    });

    let started = Instant::now();
    let source = state.source.as_ref();
    let mut set = SlideSet::load(source, &zid, &state.config.slides, &token).await?;
    set.complete(source, &token).await?;
    tracing::info!(
        target: TRACING_TARGET,
        zid = %zid,
        slides = set.slide_list().len(),
        elapsed_ms = started.elapsed().as_millis(),
        "assembled slide set"
    );
    Ok(set)
}

// ============================================================================
// Shutdown
// ============================================================================

/// Resolves on the first SIGINT or SIGTERM, so the server listening on
/// `addr` stops accepting and finishes the requests in flight. A signal
/// that cannot be watched is logged and never fires.
pub async fn shutdown_signal(addr: SocketAddr) {
    let signal = tokio::select! {
        name = interrupt() => name,
        name = terminate() => name,
    };
    tracing::info!(
        target: TRACING_TARGET,
        addr = %addr,
        signal,
        "stopping presenter, finishing open requests"
    );
}

async fn interrupt() -> &'static str {
    if let Err(err) = ctrl_c().await {
        tracing::warn!(target: TRACING_TARGET, error = %err, "cannot watch SIGINT");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

#[cfg(unix)]
async fn terminate() -> &'static str {
    match unix::signal(unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::warn!(target: TRACING_TARGET, error = %err, "cannot watch SIGTERM");
            std::future::pending::<()>().await;
        }
    }
    "SIGTERM"
}

#[cfg(not(unix))]
async fn terminate() -> &'static str {
    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZettelstoreConfig;
    use crate::content::Block;
    use crate::meta::Meta;
    use crate::test_helpers::*;
    use axum_test::TestServer;

    fn server(source: MockSource) -> TestServer {
        server_with(source, PresenterConfig::default())
    }

    fn server_with(source: MockSource, config: PresenterConfig) -> TestServer {
        let state = AppState::new(Arc::new(source), config);
        TestServer::new(router(state)).unwrap()
    }

    /// A slide set at `ROOT` listing zettel 1 and 2.
    fn deck_source() -> MockSource {
        let slideset = with_role_key(titled("Deck"), "slideset");
        MockSource::new()
            .with_zettel(root(), slideset.clone(), vec![])
            .with_order(
                root(),
                slideset,
                &[(zid(1), titled("One")), (zid(2), titled("Two"))],
            )
            .with_zettel(zid(1), titled("One"), vec![Block::paragraph("first")])
            .with_zettel(zid(2), titled("Two"), vec![Block::paragraph("second")])
    }

    fn with_role_key(meta: Meta, role: &str) -> Meta {
        meta.with(KEY_ROLE, role)
    }

    // =========================================================================
    // Zettel pages
    // =========================================================================

    #[tokio::test]
    async fn plain_zettel_is_rendered() {
        let source = MockSource::new().with_zettel(zid(1), titled("Note"), vec![Block::paragraph("hi")]);
        let response = server(source).get("/20230101000001").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("<h1>Note</h1>"));
        assert!(body.contains("<p>hi</p>"));
    }

    #[tokio::test]
    async fn home_serves_default_home_zettel() {
        let source =
            MockSource::new().with_zettel(ZettelId::default_home(), titled("Home"), vec![]);
        let response = server(source).get("/").await;
        response.assert_status_ok();
        assert!(response.text().contains("<h1>Home</h1>"));
    }

    #[tokio::test]
    async fn slideset_zettel_shows_toc() {
        let response = server(deck_source()).get("/20230101000000").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains(r#"href="/slidy/20230101000000#(2)">One</a>"#));
        assert!(body.contains(r#"href="/slidy/20230101000000#(3)">Two</a>"#));
    }

    #[tokio::test]
    async fn configured_slideset_role_is_honored() {
        let mut config = PresenterConfig::default();
        config.slides.slideset_role = "deck".to_string();
        let response = server_with(deck_source(), config).get("/20230101000000").await;
        response.assert_status_ok();
        assert!(!response.text().contains("/slidy/20230101000000#("));
    }

    #[tokio::test]
    async fn slideset_without_order_falls_back_to_zettel() {
        let source = MockSource::new().with_zettel(
            root(),
            with_role_key(titled("Broken deck"), "slideset"),
            vec![Block::paragraph("body")],
        );
        let response = server(source).get("/20230101000000").await;
        response.assert_status_ok();
        assert!(response.text().contains("<p>body</p>"));
    }

    #[tokio::test]
    async fn invalid_zid_is_not_found() {
        let response = server(MockSource::new()).get("/favicon.ico").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_zettel_is_not_found() {
        let response = server(MockSource::new()).get("/20230101000009").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn single_letter_lists_zettel() {
        let source = MockSource::new().with_list(
            "role=slideset",
            &[(root(), titled("Deck")), (zid(4), Meta::new())],
        );
        let response = server(source).get("/l?role=slideset").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("<h1>role=slideset</h1>"));
        assert!(body.contains(r#"<a href="/20230101000000">Deck</a>"#));
        assert!(body.contains(r#"<a href="/20230101000004">20230101000004</a>"#));
    }

    #[tokio::test]
    async fn list_passes_query_through() {
        let source = Arc::new(MockSource::new());
        let state = AppState::new(source.clone(), PresenterConfig::default());
        let server = TestServer::new(router(state)).unwrap();
        server.get("/h?tags=%23talk&_limit=5").await.assert_status_ok();
        assert_eq!(
            source.get_calls(),
            vec![RecordedCall::List("tags=%23talk&_limit=5".to_string())]
        );
    }

    #[tokio::test]
    async fn list_without_query_lists_everything() {
        let source = MockSource::new().with_list("", &[(zid(1), titled("One"))]);
        let response = server(source).get("/a").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("<h1>All zettel</h1>"));
        assert!(body.contains(">One</a>"));
    }

    #[test]
    fn list_segments() {
        assert!(is_list_segment("h"));
        assert!(is_list_segment("z"));
        assert!(!is_list_segment("{"));
        assert!(!is_list_segment("ab"));
        assert!(!is_list_segment(""));
    }

    #[test]
    fn list_heading_decodes_query() {
        assert_eq!(list_heading(""), "All zettel");
        assert_eq!(list_heading("tags=%23talk&_limit=5"), "tags=#talk _limit=5");
        assert_eq!(list_heading("slideset"), "slideset");
    }

    // =========================================================================
    // Shows and handouts
    // =========================================================================

    #[tokio::test]
    async fn reveal_show_is_rendered() {
        let response = server(deck_source()).get("/reveal/20230101000000").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("Reveal.initialize"));
        assert!(body.contains("first"));
        assert!(body.contains("second"));
    }

    #[tokio::test]
    async fn slidy_show_is_rendered() {
        let response = server(deck_source()).get("/slidy/20230101000000").await;
        response.assert_status_ok();
        assert!(response.text().contains("slidy"));
    }

    #[tokio::test]
    async fn handout_is_rendered() {
        let response = server(deck_source()).get("/handout/20230101000000").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains(r#"id="(2)""#));
        assert!(body.contains(r#"id="(3)""#));
    }

    #[tokio::test]
    async fn unknown_slideset_is_not_found() {
        let response = server(MockSource::new()).get("/slidy/20230101000000").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exhausted_budget_is_unavailable() {
        let mut config = PresenterConfig::default();
        config.zettelstore = ZettelstoreConfig {
            request_budget_secs: 1,
            ..ZettelstoreConfig::default()
        };
        let source = deck_source().hanging(zid(2));
        let response = server_with(source, config).get("/reveal/20230101000000").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    // =========================================================================
    // Raw content
    // =========================================================================

    #[tokio::test]
    async fn content_carries_image_type() {
        let source = MockSource::new()
            .with_zettel(zid(5), Meta::new().with(KEY_SYNTAX, "png"), vec![])
            .with_raw(zid(5), b"\x89PNG");
        let response = server(source).get("/content/20230101000005").await;
        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), "image/png");
        assert_eq!(response.as_bytes().as_ref(), b"\x89PNG");
    }

    #[tokio::test]
    async fn content_without_meta_is_octet_stream() {
        let source = MockSource::new().with_raw(zid(5), b"data");
        let response = server(source).get("/content/20230101000005").await;
        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), OCTET_STREAM);
    }

    #[tokio::test]
    async fn shutdown_waits_for_a_signal() {
        let addr: SocketAddr = "127.0.0.1:23120".parse().unwrap();
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), shutdown_signal(addr)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn missing_content_is_not_found() {
        let response = server(MockSource::new()).get("/content/20230101000005").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    // =========================================================================
    // Error mapping
    // =========================================================================

    #[test]
    fn error_statuses() {
        let missing = SourceError::NotFound(zid(1));
        assert_eq!(ServerError::from(missing).status(), StatusCode::NOT_FOUND);

        let root_missing = SlideSetError::Root {
            zid: root(),
            source: SourceError::NotFound(root()),
        };
        assert_eq!(ServerError::from(root_missing).status(), StatusCode::NOT_FOUND);

        let upstream = SourceError::Status {
            status: 500,
            url: "http://store/z/1".into(),
        };
        assert_eq!(ServerError::from(upstream).status(), StatusCode::BAD_GATEWAY);

        assert_eq!(
            ServerError::from(SlideSetError::Cancelled).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::from(RenderError::Incomplete(root())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn image_syntaxes_have_content_types() {
        assert_eq!(image_content_type("svg").as_deref(), Some("image/svg+xml"));
        assert_eq!(image_content_type("jpg").as_deref(), Some("image/jpeg"));
        assert_eq!(image_content_type("zmk"), None);
    }
}

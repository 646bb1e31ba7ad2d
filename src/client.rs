//! HTTP client for the Zettelstore API.
//!
//! ```text
//! fetch_meta    GET {base}/z/{zid}?enc=zjson&part=meta
//! fetch_zettel  GET {base}/z/{zid}?enc=zjson
//! fetch_raw     GET {base}/z/{zid}?part=content
//! fetch_order   GET {base}/o/{zid}
//! fetch_list    GET {base}/j?{query}
//! ```
//!
//! A 404 answer for a zettel maps to [`SourceError::NotFound`], any other
//! non-2xx status to [`SourceError::Status`]. Each request is bounded by the configured
//! timeout.

use crate::meta::Meta;
use crate::source::{ContentSource, SourceError, TRACING_TARGET, Zettel, ZettelOrder, ZettelRef};
use crate::zid::ZettelId;
use crate::zjson;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

struct ZettelstoreClientInner {
    http: Client,
    base: Url,
}

impl std::fmt::Debug for ZettelstoreClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZettelstoreClientInner")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

/// [`ContentSource`] backed by a Zettelstore over HTTP. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ZettelstoreClient {
    inner: Arc<ZettelstoreClientInner>,
}

impl ZettelstoreClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, SourceError> {
        let mut base = Url::parse(base)?;
        // Url::join drops the last path segment unless it ends in a slash.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("zettel-presenter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        tracing::debug!(
            target: TRACING_TARGET,
            base = %base,
            timeout_ms = timeout.as_millis(),
            "created zettelstore client"
        );
        Ok(Self {
            inner: Arc::new(ZettelstoreClientInner { http, base }),
        })
    }

    pub fn base(&self) -> &Url {
        &self.inner.base
    }

    /// URL of `{prefix}/{zid}` with an optional query.
    fn endpoint(&self, prefix: &str, zid: &ZettelId, query: Option<&str>) -> Result<Url, SourceError> {
        let mut url = self.inner.base.join(&format!("{prefix}/{zid}"))?;
        url.set_query(query);
        Ok(url)
    }

    /// A 404 is [`SourceError::NotFound`] only when a zettel was asked for.
    async fn get(&self, url: Url, zid: Option<&ZettelId>) -> Result<Vec<u8>, SourceError> {
        tracing::trace!(target: TRACING_TARGET, url = %url, "GET");
        let response = self.inner.http.get(url.clone()).send().await?;
        match (response.status(), zid) {
            (status, _) if status.is_success() => Ok(response.bytes().await?.to_vec()),
            (StatusCode::NOT_FOUND, Some(zid)) => Err(SourceError::NotFound(zid.clone())),
            (status, _) => Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl ContentSource for ZettelstoreClient {
    async fn fetch_meta(&self, zid: &ZettelId) -> Result<Meta, SourceError> {
        let url = self.endpoint("z", zid, Some("enc=zjson&part=meta"))?;
        let body = self.get(url, Some(zid)).await?;
        zjson::decode_meta_body(&body).map_err(|source| SourceError::Decode {
            zid: zid.clone(),
            source,
        })
    }

    async fn fetch_zettel(&self, zid: &ZettelId) -> Result<Zettel, SourceError> {
        let url = self.endpoint("z", zid, Some("enc=zjson"))?;
        let body = self.get(url, Some(zid)).await?;
        zjson::decode_zettel(zid, &body).map_err(|source| SourceError::Decode {
            zid: zid.clone(),
            source,
        })
    }

    async fn fetch_raw(&self, zid: &ZettelId) -> Result<Vec<u8>, SourceError> {
        let url = self.endpoint("z", zid, Some("part=content"))?;
        self.get(url, Some(zid)).await
    }

    async fn fetch_order(&self, zid: &ZettelId) -> Result<ZettelOrder, SourceError> {
        let url = self.endpoint("o", zid, None)?;
        let body = self.get(url, Some(zid)).await?;
        zjson::decode_order(&body).map_err(|source| SourceError::Decode {
            zid: zid.clone(),
            source,
        })
    }

    async fn fetch_list(&self, query: &str) -> Result<Vec<ZettelRef>, SourceError> {
        let mut url = self.inner.base.join("j")?;
        url.set_query(Some(query).filter(|q| !q.is_empty()));
        let body = self.get(url, None).await?;
        zjson::decode_list(&body).map_err(SourceError::DecodeList)
    }
}

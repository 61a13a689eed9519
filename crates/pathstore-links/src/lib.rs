//! Short-link registry.
//!
//! A short link is a row `{short_id, url}`. The integer id is the internal
//! key; what users share is its [`Codec`] token. Resolving a token is not a
//! pure read: it bumps the link's access counter and last-access time in the
//! same backend statement that finds the row.

pub mod error;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use url::Url;

use pathstore_codec::Codec;
use pathstore_store::{InMemoryLinkStore, LinkBackend, ShortLink, StoreError};

pub use error::{LinkError, LinkResult};

/// Query parameters a redirect carries over from the short-link request.
pub const FORWARDED_PARAMS: &[&str] = &["student", "username", "password"];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The result of creating a link.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreatedLink {
    pub id: i64,
    pub token: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// The result of resolving a token.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedLink {
    pub id: i64,
    pub url: String,
    pub access_count: i64,
}

/// Registry over a [`LinkBackend`] and a token codec.
#[derive(Clone)]
pub struct ShortLinkRegistry {
    backend: Arc<dyn LinkBackend>,
    codec: Codec,
    timeout: Duration,
}

impl ShortLinkRegistry {
    pub fn new(backend: Arc<dyn LinkBackend>, codec: Codec) -> Self {
        Self {
            backend,
            codec,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A registry over a fresh in-memory backend with the base-62 codec.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLinkStore::new()), Codec::default())
    }

    /// Bound every backend call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    async fn bounded<T, F>(&self, fut: F) -> LinkResult<T>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(LinkError::from),
            Err(_) => Err(LinkError::Store(StoreError::Unavailable(format!(
                "short link store did not answer within {:?}",
                self.timeout
            )))),
        }
    }

    /// Register `url`, under `custom_id` if given.
    ///
    /// A taken `custom_id` fails with [`LinkError::Conflict`].
    pub async fn create(&self, url: &str, custom_id: Option<i64>) -> LinkResult<CreatedLink> {
        let url = validate_url(url)?;
        if let Some(id) = custom_id {
            // Reject ids the codec cannot represent before touching storage.
            self.codec.encode(id)?;
        }

        let link = self.bounded(self.backend.insert(&url, custom_id)).await?;
        let token = self.codec.encode(link.short_id)?;
        debug!(id = link.short_id, %token, "short link created");
        Ok(CreatedLink {
            id: link.short_id,
            token,
            url: link.url,
            created_at: link.created_at,
        })
    }

    /// Register `url` under a caller-chosen token.
    ///
    /// The token is decoded to its id first; a token with characters outside
    /// the alphabet fails with [`LinkError::InvalidCode`]. The returned token
    /// is the canonical encoding of that id.
    pub async fn create_with_code(
        &self,
        url: &str,
        custom_code: Option<&str>,
    ) -> LinkResult<CreatedLink> {
        let custom_id = match custom_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.codec.decode(code).map_err(|source| {
                LinkError::InvalidCode {
                    code: code.to_string(),
                    source,
                }
            })?),
            None => None,
        };
        self.create(url, custom_id).await
    }

    /// Resolve a token to its URL, counting the access.
    ///
    /// A token that does not decode is reported as [`LinkError::NotFound`]:
    /// to a caller it is indistinguishable from one that was never issued.
    pub async fn resolve(&self, token: &str) -> LinkResult<ResolvedLink> {
        let id = self.decode_token(token)?;
        let link = self
            .bounded(self.backend.touch(id))
            .await?
            .ok_or_else(|| LinkError::NotFound(token.to_string()))?;
        debug!(id, access_count = link.access_count, "short link resolved");
        Ok(ResolvedLink {
            id,
            url: link.url,
            access_count: link.access_count,
        })
    }

    /// The stored row behind a token, without counting an access.
    pub async fn stats(&self, token: &str) -> LinkResult<ShortLink> {
        let id = self.decode_token(token)?;
        self.bounded(self.backend.get(id))
            .await?
            .ok_or_else(|| LinkError::NotFound(token.to_string()))
    }

    fn decode_token(&self, token: &str) -> LinkResult<i64> {
        self.codec.decode(token).map_err(|e| {
            debug!(%token, error = %e, "undecodable short code");
            LinkError::NotFound(token.to_string())
        })
    }
}

impl std::fmt::Debug for ShortLinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortLinkRegistry")
            .field("codec", &self.codec)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Check a link target: absolute `http`/`https` only.
///
/// Returns the target trimmed but otherwise as given.
pub fn validate_url(raw: &str) -> LinkResult<String> {
    let invalid = |reason: String| LinkError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// Append the [`FORWARDED_PARAMS`] present in `params` to `target`.
pub fn redirect_target<'a, I>(target: &str, params: I) -> LinkResult<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let forwarded: Vec<(&str, &str)> = params
        .into_iter()
        .filter(|(k, _)| FORWARDED_PARAMS.contains(k))
        .collect();
    if forwarded.is_empty() {
        return Ok(target.to_string());
    }
    let mut url = Url::parse(target).map_err(|e| LinkError::InvalidUrl {
        url: target.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().extend_pairs(forwarded);
    Ok(url.into())
}

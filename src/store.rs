use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::entry::{CacheEntry, Variant};
use crate::error::BoxError;
use crate::HeaderMapExt;

/// Persists cache entries and their bodies. Implementations must make
/// `update`, `insert`, and `invalidate` atomic with respect to single-key
/// lookups; the caching layer adds no locking of its own.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// The stored entry answering `request`, following the variant map when
    /// the representation varies.
    async fn get_cache_entry(
        &self,
        request: &Request<Bytes>,
    ) -> Result<Option<Arc<CacheEntry>>, BoxError>;

    /// All stored variants of `request`'s target that carry an entity tag,
    /// keyed by that tag.
    async fn get_variant_cache_entries_with_etags(
        &self,
        request: &Request<Bytes>,
    ) -> Result<HashMap<String, Variant>, BoxError>;

    /// Persists `response` for `request` and returns a response whose body is
    /// served from the stored resource.
    async fn cache_and_return_response(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Result<Response<Bytes>, BoxError>;

    /// Replaces `entry` with a copy refreshed by a `304 Not Modified`
    /// exchange; the body resource is preserved.
    async fn update_cache_entry(
        &self,
        request: &Request<Bytes>,
        entry: Arc<CacheEntry>,
        not_modified: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Result<Arc<CacheEntry>, BoxError>;

    /// Variant-map aware form of [`update_cache_entry`](Self::update_cache_entry):
    /// refreshes the entry stored under `variant_cache_key`.
    async fn update_variant_cache_entry(
        &self,
        conditional_request: &Request<Bytes>,
        entry: Arc<CacheEntry>,
        not_modified: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
        variant_cache_key: &str,
    ) -> Result<Arc<CacheEntry>, BoxError>;

    /// Points `request`'s selecting headers at `variant` in the root entry's
    /// variant map, promoting it to most recently used.
    async fn reuse_variant_entry_for(
        &self,
        request: &Request<Bytes>,
        variant: &Variant,
    ) -> Result<(), BoxError>;

    /// Drops the entry (and any variants) stored for `request`'s target.
    async fn flush_cache_entries_for(
        &self,
        request: &Request<Bytes>,
    ) -> Result<(), BoxError>;

    /// Invalidation after an unsafe method (rfc2616 13.10): drops entries for
    /// the effective URI and for any `Location` / `Content-Location` targets
    /// on the same host.
    async fn flush_invalidated_cache_entries_for(
        &self,
        request: &Request<Bytes>,
    ) -> Result<(), BoxError>;
}

/// Derives storage keys from requests. Stateless; shared by stores and the
/// suitability check so both sides agree on what "the same variant" means.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyGenerator;

impl CacheKeyGenerator {
    /// Canonical storage key for a request target: the effective URI with
    /// lowercased scheme/host, default port elided, and path normalized.
    #[must_use]
    pub fn cache_key(&self, request: &Request<Bytes>) -> String {
        self.uri_key(&request.uri().to_string())
    }

    /// Canonicalizes an arbitrary URI reference the same way as
    /// [`cache_key`](Self::cache_key).
    #[must_use]
    pub fn uri_key(&self, uri: &str) -> String {
        match Url::parse(uri) {
            Ok(url) => url.to_string(),
            Err(_) => uri.to_string(),
        }
    }

    /// Deterministic key over the request's values of the entry's selecting
    /// headers (the names listed in `Vary`).
    #[must_use]
    pub fn variant_key(
        &self,
        request: &Request<Bytes>,
        entry: &CacheEntry,
    ) -> String {
        self.variant_key_from_headers(request, entry.headers())
    }

    /// Same as [`variant_key`](Self::variant_key), reading `Vary` from raw
    /// response headers before any entry exists.
    #[must_use]
    pub fn variant_key_from_headers(
        &self,
        request: &Request<Bytes>,
        response_headers: &http::HeaderMap,
    ) -> String {
        let mut names: Vec<String> = response_headers
            .get_all(http::header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        names.dedup();
        let mut out = String::from("{");
        let mut first = true;
        for name in names {
            if !first {
                out.push('&');
            }
            first = false;
            let value = request.headers().get_str(&name).unwrap_or_default();
            out.push_str(&name);
            out.push('=');
            out.extend(byte_serialize(value.as_bytes()));
        }
        out.push('}');
        out
    }

    /// Storage key of one variant: the variant key prefixed to the root key.
    #[must_use]
    pub fn variant_cache_key(&self, variant_key: &str, cache_key: &str) -> String {
        format!("{variant_key}{cache_key}")
    }
}

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, PRAGMA, RANGE};
use http::{Method, Request, Response, StatusCode};
use log::debug;

use crate::cache_control::CacheControl;
use crate::{CacheConfig, HeaderMapExt};

// Cacheable in the absence of explicit freshness information (rfc2616 13.4).
const CACHEABLE_BY_DEFAULT: &[u16] = &[200, 203, 300, 301, 410];

/// Decides whether a request may even be answered from cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheableRequestPolicy;

impl CacheableRequestPolicy {
    /// `false` sends the request straight to the backend.
    #[must_use]
    pub fn is_servable_from_cache(&self, request: &Request<Bytes>) -> bool {
        if request.method() != Method::GET {
            debug!("{} request is not servable from cache", request.method());
            return false;
        }
        // range responses are never cached, so range requests pass through
        if request.headers().contains_key(RANGE) {
            return false;
        }
        let cc = CacheControl::from_headers(request.headers());
        if cc.has("no-store") || cc.has("no-cache") {
            return false;
        }
        if request
            .headers()
            .get_str(PRAGMA.as_str())
            .is_some_and(|v| v.to_ascii_lowercase().contains("no-cache"))
        {
            return false;
        }
        true
    }
}

/// Decides whether a backend response may be stored.
#[derive(Debug, Clone, Copy)]
pub struct ResponseCachingPolicy {
    max_object_size: usize,
    shared: bool,
}

impl ResponseCachingPolicy {
    /// Derives the policy from the cache configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            max_object_size: config.max_object_size_bytes,
            shared: config.shared_cache,
        }
    }

    /// Whether `response` to `request` may enter the store.
    #[must_use]
    pub fn is_response_cacheable(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
    ) -> bool {
        if request.method() != Method::GET {
            return false;
        }
        let request_cc = CacheControl::from_headers(request.headers());
        if request_cc.has("no-store") {
            return false;
        }
        // partial content is out of scope; pass it through untouched
        if response.status() == StatusCode::PARTIAL_CONTENT
            || response.headers().contains_key(CONTENT_RANGE)
        {
            return false;
        }
        if response.status() == StatusCode::SEE_OTHER
            || response.status().is_informational()
            || response.status().canonical_reason().is_none()
        {
            return false;
        }
        let response_cc = CacheControl::from_headers(response.headers());
        if response_cc.has("no-store") {
            return false;
        }
        if self.shared && response_cc.has("private") {
            return false;
        }
        if self.shared
            && request.headers().contains_key(AUTHORIZATION)
            && !(response_cc.has("s-maxage")
                || response_cc.has("must-revalidate")
                || response_cc.has("public"))
        {
            return false;
        }
        if self.body_too_large(response) {
            debug!(
                "response body exceeds {} byte object limit",
                self.max_object_size
            );
            return false;
        }
        let explicit = self.has_explicit_caching_headers(response, &response_cc);
        if CACHEABLE_BY_DEFAULT.contains(&response.status().as_u16()) {
            return true;
        }
        // everything else is uncacheable by default; explicit freshness or a
        // validator opts it in
        explicit
            || response.headers().contains_key("etag")
            || response.headers().contains_key("last-modified")
    }

    fn has_explicit_caching_headers(
        &self,
        response: &Response<Bytes>,
        response_cc: &CacheControl,
    ) -> bool {
        response.headers().contains_key("expires")
            || response_cc.has("max-age")
            || (self.shared && response_cc.has("s-maxage"))
            || response_cc.has("public")
    }

    fn body_too_large(&self, response: &Response<Bytes>) -> bool {
        if response.body().len() > self.max_object_size {
            return true;
        }
        response
            .headers()
            .get_str(CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .is_some_and(|len| len > self.max_object_size as u64)
    }
}

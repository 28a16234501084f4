use std::collections::HashMap;

use bytes::Bytes;
use http::header::{
    CACHE_CONTROL, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    IF_UNMODIFIED_SINCE, PRAGMA,
};
use http::{HeaderValue, Request};

use crate::clone_request;
use crate::entry::{CacheEntry, Variant};

/// Derives conditional (`If-*`) requests from stored entries, and strips
/// conditions back off for forced end-to-end reloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalRequestBuilder;

impl ConditionalRequestBuilder {
    /// Clone of `request` revalidating `entry`: `If-None-Match` from the
    /// entry's entity tag, `If-Modified-Since` from its `Last-Modified`.
    ///
    /// With neither validator present the request is returned unchanged.
    #[must_use]
    pub fn build_conditional_request(
        &self,
        request: &Request<Bytes>,
        entry: &CacheEntry,
    ) -> Request<Bytes> {
        let mut out = clone_request(request);
        if let Some(etag) = entry.etag() {
            if let Ok(value) = HeaderValue::from_str(etag) {
                out.headers_mut().insert(IF_NONE_MATCH, value);
            }
        }
        if let Some(last_modified) = entry.last_modified() {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                out.headers_mut().insert(IF_MODIFIED_SINCE, value);
            }
        }
        out
    }

    /// Clone of `request` negotiating among `variants`: `If-None-Match`
    /// carries every known entity tag.
    #[must_use]
    pub fn build_conditional_request_from_variants(
        &self,
        request: &Request<Bytes>,
        variants: &HashMap<String, Variant>,
    ) -> Request<Bytes> {
        let mut etags: Vec<&str> =
            variants.keys().map(String::as_str).collect();
        etags.sort_unstable();
        let mut out = clone_request(request);
        if let Ok(value) = HeaderValue::from_str(&etags.join(", ")) {
            out.headers_mut().insert(IF_NONE_MATCH, value);
        }
        out
    }

    /// Clone of `request` with every condition removed and an end-to-end
    /// reload forced, for retrying after clock skew or an unusable `304`.
    #[must_use]
    pub fn build_unconditional_request(
        &self,
        request: &Request<Bytes>,
    ) -> Request<Bytes> {
        let mut out = clone_request(request);
        let headers = out.headers_mut();
        headers.remove(IF_NONE_MATCH);
        headers.remove(IF_MODIFIED_SINCE);
        headers.remove(IF_MATCH);
        headers.remove(IF_UNMODIFIED_SINCE);
        headers.remove(IF_RANGE);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        out
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use http::header::{ETAG, LAST_MODIFIED, VARY, WARNING};
use http::{HeaderMap, Method, StatusCode, Version};

use crate::cache_control::CacheControl;
use crate::resource::Resource;
use crate::HeaderMapExt;

// Headers describing the stored body; a 304 carries none of these for the
// entity it validates, so they must survive a revalidation update untouched.
const EXCLUDED_FROM_UPDATE: &[&str] =
    &["content-length", "content-encoding", "transfer-encoding", "content-range"];

/// The stored artifact for one (request-target, cache-key) pair.
///
/// Immutable once created: a revalidation update produces a fresh entry that
/// replaces the old one while inheriting its body resource.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    request_date: SystemTime,
    response_date: SystemTime,
    request_method: Method,
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    resource: Resource,
    /// Selecting-header key of the producing request, present only when the
    /// response varies.
    variant_key: Option<String>,
    /// variant key → variant cache key; non-empty only on root entries of
    /// varying representations.
    variant_map: HashMap<String, String>,
}

impl CacheEntry {
    /// Creates an entry from the pieces of one backend exchange.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        request_date: SystemTime,
        response_date: SystemTime,
        request_method: Method,
        status: StatusCode,
        version: Version,
        headers: HeaderMap,
        resource: Resource,
        variant_key: Option<String>,
    ) -> Self {
        debug_assert!(response_date >= request_date);
        Self {
            request_date,
            response_date,
            request_method,
            status,
            version,
            headers,
            resource,
            variant_key,
            variant_map: HashMap::new(),
        }
    }

    /// Wall-clock reading taken just before the producing exchange.
    #[must_use]
    pub fn request_date(&self) -> SystemTime {
        self.request_date
    }

    /// Wall-clock reading taken just after the producing exchange.
    #[must_use]
    pub fn response_date(&self) -> SystemTime {
        self.response_date
    }

    /// Method of the request that produced this entry.
    #[must_use]
    pub fn request_method(&self) -> &Method {
        &self.request_method
    }

    /// Stored status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Stored protocol version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Stored response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Handle to the stored body.
    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Selecting-header key of the producing request, when the response varies.
    #[must_use]
    pub fn variant_key(&self) -> Option<&str> {
        self.variant_key.as_deref()
    }

    /// variant key → variant cache key of the representations stored for
    /// this target.
    #[must_use]
    pub fn variant_map(&self) -> &HashMap<String, String> {
        &self.variant_map
    }

    /// Whether this entry is the root of a varying representation.
    #[must_use]
    pub fn has_variants(&self) -> bool {
        !self.variant_map.is_empty() || self.headers.contains_key(VARY)
    }

    /// First value of a header as a string.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get_str(name)
    }

    /// The origin-provided `Date` header, parsed.
    #[must_use]
    pub fn date(&self) -> Option<SystemTime> {
        self.headers.get_date("date")
    }

    /// The entry's entity tag, verbatim (including any `W/` prefix).
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.headers.get_str(ETAG.as_str()).map(str::trim)
    }

    /// The entry's `Last-Modified` value, unparsed for echoing into
    /// `If-Modified-Since`.
    #[must_use]
    pub fn last_modified(&self) -> Option<&str> {
        self.headers.get_str(LAST_MODIFIED.as_str())
    }

    /// Header names listed in the stored `Vary` header, lowercased.
    pub fn vary_names(&self) -> impl Iterator<Item = String> + '_ {
        self.headers
            .get_all(VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
    }

    pub(crate) fn cache_control(&self) -> CacheControl {
        CacheControl::from_headers(&self.headers)
    }

    /// Copy of this entry with the body handle replaced.
    #[must_use]
    pub(crate) fn with_resource(&self, resource: Resource) -> Self {
        let mut entry = self.clone();
        entry.resource = resource;
        entry
    }

    /// Copy of this entry bound to different selecting-header values, for
    /// variant reuse after a negotiated `304`.
    #[must_use]
    pub(crate) fn with_variant_key(&self, variant_key: String) -> Self {
        let mut entry = self.clone();
        entry.variant_key = Some(variant_key);
        entry
    }

    /// Copy of this entry with `variant_map` replaced, for root entries of
    /// varying representations.
    #[must_use]
    pub fn with_variant_map(&self, variant_map: HashMap<String, String>) -> Self {
        let mut entry = self.clone();
        entry.variant_map = variant_map;
        entry
    }

    /// Copy of this entry refreshed by a `304 Not Modified` exchange.
    ///
    /// Headers from the 304 replace same-named stored headers, except those
    /// describing the preserved body; stored 1xx warnings are dropped. The
    /// body resource is inherited unchanged.
    #[must_use]
    pub fn with_updated_headers(
        &self,
        not_modified_headers: &HeaderMap,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Self {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for name in self.headers.keys() {
            let replaced = not_modified_headers.contains_key(name)
                && !EXCLUDED_FROM_UPDATE.contains(&name.as_str());
            if replaced {
                for value in not_modified_headers.get_all(name) {
                    headers.append(name.clone(), value.clone());
                }
                continue;
            }
            for value in self.headers.get_all(name) {
                // stored 1xx warnings are stale after a successful revalidation
                if *name == WARNING {
                    if let Ok(text) = value.to_str() {
                        if text.trim_start().starts_with('1') {
                            continue;
                        }
                    }
                }
                headers.append(name.clone(), value.clone());
            }
        }
        // headers that are new in the 304
        for name in not_modified_headers.keys() {
            if !self.headers.contains_key(name) {
                for value in not_modified_headers.get_all(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        Self {
            request_date,
            response_date,
            request_method: self.request_method.clone(),
            status: self.status,
            version: self.version,
            headers,
            resource: self.resource.clone(),
            variant_key: self.variant_key.clone(),
            variant_map: self.variant_map.clone(),
        }
    }
}

/// One representation of a varying resource, as surfaced during variant
/// negotiation.
#[derive(Debug, Clone)]
pub struct Variant {
    variant_key: String,
    cache_key: String,
    entry: Arc<CacheEntry>,
}

impl Variant {
    /// Binds a stored entry to its selecting-header key and storage key.
    #[must_use]
    pub fn new(variant_key: String, cache_key: String, entry: Arc<CacheEntry>) -> Self {
        Self { variant_key, cache_key, entry }
    }

    /// Deterministic key over the producing request's selecting headers.
    #[must_use]
    pub fn variant_key(&self) -> &str {
        &self.variant_key
    }

    /// Storage key the variant entry lives under.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// The stored representation.
    #[must_use]
    pub fn entry(&self) -> &Arc<CacheEntry> {
        &self.entry
    }
}

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use http::header::{
    IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE,
};
use http::Request;
use log::debug;

use crate::cache_control::CacheControl;
use crate::entry::CacheEntry;
use crate::store::CacheKeyGenerator;
use crate::validity::CacheValidityPolicy;
use crate::HeaderMapExt;

/// Matches a stored entry against a live request: validators, selecting
/// headers, freshness, and request directives.
#[derive(Debug, Clone, Copy)]
pub struct CachedResponseSuitabilityChecker {
    validity: CacheValidityPolicy,
    keys: CacheKeyGenerator,
}

impl CachedResponseSuitabilityChecker {
    /// Builds the checker around the freshness arithmetic in use.
    #[must_use]
    pub fn new(validity: CacheValidityPolicy) -> Self {
        Self { validity, keys: CacheKeyGenerator }
    }

    /// Whether `entry` may answer `request` without contacting the origin.
    #[must_use]
    pub fn can_cached_response_be_used(
        &self,
        request: &Request<Bytes>,
        entry: &CacheEntry,
        now: SystemTime,
    ) -> bool {
        if request.method() != entry.request_method() {
            return false;
        }
        if !self.selecting_headers_match(request, entry) {
            debug!("cached entry does not match the request's selecting headers");
            return false;
        }
        let request_cc = CacheControl::from_headers(request.headers());
        if request_cc.has("no-cache") || request_cc.has("no-store") {
            return false;
        }
        let current_age = self.validity.current_age(entry, now);
        let lifetime = self.validity.freshness_lifetime(entry);
        if let Some(max_age) = request_cc.seconds("max-age") {
            if current_age > Duration::from_secs(max_age) {
                return false;
            }
        }
        if let Some(min_fresh) = request_cc.seconds("min-fresh") {
            if lifetime.saturating_sub(current_age)
                < Duration::from_secs(min_fresh)
            {
                return false;
            }
        }
        if !self.validity.is_response_fresh(entry, now)
            && !self.staleness_accepted(&request_cc, entry, now)
        {
            return false;
        }
        // preconditions the cache cannot answer go to the origin
        if request.headers().contains_key(IF_MATCH)
            || request.headers().contains_key(IF_UNMODIFIED_SINCE)
            || request.headers().contains_key(IF_RANGE)
        {
            return false;
        }
        if self.is_conditional(request)
            && !self.all_conditionals_match(request, entry, now)
        {
            return false;
        }
        true
    }

    fn selecting_headers_match(
        &self,
        request: &Request<Bytes>,
        entry: &CacheEntry,
    ) -> bool {
        if entry.vary_names().any(|name| name == "*") {
            return false;
        }
        match entry.variant_key() {
            Some(stored) => self.keys.variant_key(request, entry) == stored,
            // a varying entry without its producing key cannot be matched
            None => !entry.headers().contains_key("vary"),
        }
    }

    fn staleness_accepted(
        &self,
        request_cc: &CacheControl,
        entry: &CacheEntry,
        now: SystemTime,
    ) -> bool {
        if self.validity.staleness_forbidden(entry) {
            return false;
        }
        if !request_cc.has("max-stale") {
            return false;
        }
        // bare max-stale accepts any staleness
        if request_cc.is_bare("max-stale") {
            return true;
        }
        request_cc.seconds("max-stale").is_some_and(|secs| {
            self.validity.stale_for(entry, now) <= Duration::from_secs(secs)
        })
    }

    /// The request carries conditional headers.
    #[must_use]
    pub fn is_conditional(&self, request: &Request<Bytes>) -> bool {
        request.headers().contains_key(IF_NONE_MATCH)
            || request.headers().contains_key(IF_MODIFIED_SINCE)
    }

    /// The entry satisfies every conditional the request carries, so a `304`
    /// answer is appropriate.
    #[must_use]
    pub fn all_conditionals_match(
        &self,
        request: &Request<Bytes>,
        entry: &CacheEntry,
        _now: SystemTime,
    ) -> bool {
        let has_inm = request.headers().contains_key(IF_NONE_MATCH);
        let has_ims = request.headers().contains_key(IF_MODIFIED_SINCE);
        if has_inm && !self.etag_matches(request, entry) {
            return false;
        }
        if has_ims && !self.not_modified_since(request, entry) {
            return false;
        }
        has_inm || has_ims
    }

    fn etag_matches(&self, request: &Request<Bytes>, entry: &CacheEntry) -> bool {
        let Some(etag) = entry.etag() else { return false };
        let etag = etag.trim_start_matches("W/");
        request
            .headers()
            .get_all(IF_NONE_MATCH)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .any(|token| token == "*" || token.trim_start_matches("W/") == etag)
    }

    fn not_modified_since(
        &self,
        request: &Request<Bytes>,
        entry: &CacheEntry,
    ) -> bool {
        let Some(since) =
            request.headers().get_date(IF_MODIFIED_SINCE.as_str())
        else {
            return false;
        };
        let Some(last_modified) = entry.headers().get_date("last-modified")
        else {
            return false;
        };
        last_modified <= since
    }
}

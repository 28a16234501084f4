use std::time::{Duration, SystemTime};

use http::HeaderMap;

use crate::cache_control::CacheControl;
use crate::entry::CacheEntry;
use crate::{CacheConfig, HeaderMapExt};

// Statuses that may be assigned a heuristic lifetime (rfc2616 13.4).
const HEURISTIC_STATUSES: &[u16] = &[200, 203, 300, 301, 410];

/// Pure freshness and age arithmetic over a stored entry and a wall-clock
/// reading (rfc2616 13.2). Never blocks, never touches the store.
#[derive(Debug, Clone, Copy)]
pub struct CacheValidityPolicy {
    shared: bool,
    heuristic_enabled: bool,
    heuristic_coefficient: f32,
    heuristic_default_lifetime: Duration,
}

impl CacheValidityPolicy {
    /// Derives the arithmetic knobs from the cache configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            shared: config.shared_cache,
            heuristic_enabled: config.heuristic_caching_enabled,
            heuristic_coefficient: config.heuristic_coefficient,
            heuristic_default_lifetime: Duration::from_secs(
                config.heuristic_default_lifetime_secs,
            ),
        }
    }

    fn apparent_age(&self, entry: &CacheEntry) -> Duration {
        let date = entry.date().unwrap_or_else(|| entry.response_date());
        entry.response_date().duration_since(date).unwrap_or_default()
    }

    fn age_header_value(&self, entry: &CacheEntry) -> Duration {
        Duration::from_secs(
            entry
                .header_str("age")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        )
    }

    fn corrected_received_age(&self, entry: &CacheEntry) -> Duration {
        self.apparent_age(entry).max(self.age_header_value(entry))
    }

    fn response_delay(&self, entry: &CacheEntry) -> Duration {
        entry
            .response_date()
            .duration_since(entry.request_date())
            .unwrap_or_default()
    }

    fn corrected_initial_age(&self, entry: &CacheEntry) -> Duration {
        self.corrected_received_age(entry) + self.response_delay(entry)
    }

    fn resident_time(&self, entry: &CacheEntry, now: SystemTime) -> Duration {
        now.duration_since(entry.response_date()).unwrap_or_default()
    }

    /// The cache's best estimate of the response's age at `now`.
    #[must_use]
    pub fn current_age(&self, entry: &CacheEntry, now: SystemTime) -> Duration {
        self.corrected_initial_age(entry) + self.resident_time(entry, now)
    }

    /// Server-declared (or, when enabled, heuristic) duration during which
    /// the entry is fresh without revalidation.
    #[must_use]
    pub fn freshness_lifetime(&self, entry: &CacheEntry) -> Duration {
        let cc = entry.cache_control();
        // a response the origin marked no-cache is never fresh
        if cc.has("no-cache") {
            return Duration::ZERO;
        }
        if self.shared {
            if let Some(secs) = cc.seconds("s-maxage") {
                return Duration::from_secs(secs);
            }
        }
        if let Some(secs) = cc.seconds("max-age") {
            return Duration::from_secs(secs);
        }
        if let Some(expires) = entry.headers().get_date("expires") {
            let date = entry.date().unwrap_or_else(|| entry.response_date());
            return expires.duration_since(date).unwrap_or_default();
        }
        self.heuristic_freshness_lifetime(entry)
    }

    /// Heuristic lifetime (rfc2616 13.2.4) for eligible statuses, when the
    /// configuration allows it.
    #[must_use]
    pub fn heuristic_freshness_lifetime(&self, entry: &CacheEntry) -> Duration {
        if !self.heuristic_enabled
            || !HEURISTIC_STATUSES.contains(&entry.status().as_u16())
        {
            return Duration::ZERO;
        }
        if let Some(last_modified) = entry.headers().get_date("last-modified") {
            let date = entry.date().unwrap_or_else(|| entry.response_date());
            if let Ok(since) = date.duration_since(last_modified) {
                let scaled =
                    since.as_secs_f64() * f64::from(self.heuristic_coefficient);
                return Duration::from_secs(scaled as u64);
            }
        }
        self.heuristic_default_lifetime
    }

    /// Whether the entry carries explicit freshness information, as opposed
    /// to a heuristically assigned lifetime.
    #[must_use]
    pub fn has_explicit_freshness(&self, entry: &CacheEntry) -> bool {
        let cc = entry.cache_control();
        (self.shared && cc.has("s-maxage"))
            || cc.has("max-age")
            || entry.headers().contains_key("expires")
    }

    /// `freshness_lifetime > current_age`.
    #[must_use]
    pub fn is_response_fresh(&self, entry: &CacheEntry, now: SystemTime) -> bool {
        self.freshness_lifetime(entry) > self.current_age(entry, now)
    }

    /// How far past its freshness lifetime the entry is at `now`; zero while
    /// fresh.
    #[must_use]
    pub fn stale_for(&self, entry: &CacheEntry, now: SystemTime) -> Duration {
        self.current_age(entry, now)
            .saturating_sub(self.freshness_lifetime(entry))
    }

    /// The entry carries a validator usable in a conditional request.
    #[must_use]
    pub fn is_revalidatable(&self, entry: &CacheEntry) -> bool {
        entry.etag().is_some() || entry.last_modified().is_some()
    }

    /// The entry forbids serving stale under any circumstance.
    #[must_use]
    pub fn must_revalidate(&self, entry: &CacheEntry) -> bool {
        entry.cache_control().has("must-revalidate")
    }

    /// Shared-cache variant of [`must_revalidate`](Self::must_revalidate).
    #[must_use]
    pub fn proxy_revalidate(&self, entry: &CacheEntry) -> bool {
        entry.cache_control().has("proxy-revalidate")
    }

    /// Staleness bans that apply to this cache (must-revalidate always;
    /// proxy-revalidate when shared).
    #[must_use]
    pub fn staleness_forbidden(&self, entry: &CacheEntry) -> bool {
        self.must_revalidate(entry)
            || (self.shared && self.proxy_revalidate(entry))
    }

    /// rfc5861 `stale-if-error`: the request or the entry permits serving
    /// this entry despite an origin error, and it is not too stale.
    #[must_use]
    pub fn may_return_stale_if_error(
        &self,
        request_headers: &HeaderMap,
        entry: &CacheEntry,
        now: SystemTime,
    ) -> bool {
        let stale_for = self.stale_for(entry, now);
        let within = |cc: &CacheControl| {
            cc.seconds("stale-if-error")
                .is_some_and(|secs| stale_for <= Duration::from_secs(secs))
        };
        within(&CacheControl::from_headers(request_headers))
            || within(&entry.cache_control())
    }

    /// rfc5861 `stale-while-revalidate`: the entry permits serving stale
    /// while a background revalidation is in flight.
    #[must_use]
    pub fn may_return_stale_while_revalidating(
        &self,
        entry: &CacheEntry,
        now: SystemTime,
    ) -> bool {
        entry
            .cache_control()
            .seconds("stale-while-revalidate")
            .is_some_and(|secs| {
                self.stale_for(entry, now) <= Duration::from_secs(secs)
            })
    }
}

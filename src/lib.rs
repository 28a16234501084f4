#![forbid(unsafe_code, future_incompatible)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces,
    unused_extern_crates,
    trivial_casts,
    trivial_numeric_casts
)]
//! An RFC 2616 / RFC 5861 caching layer that sits between an application
//! and an HTTP client backend.
//!
//! For each outbound request the layer decides whether to answer from a
//! local store of previously retrieved responses, to revalidate a stored
//! entry conditionally, or to forward unconditionally; the backend's answer
//! is then folded back into the store. It implements:
//!
//! - cache validity arithmetic (age, freshness lifetime, staleness),
//! - cacheability policies for requests and responses, including
//!   shared-cache rules,
//! - conditional request construction (`If-None-Match` /
//!   `If-Modified-Since`) and variant negotiation over `Vary`,
//! - background revalidation for `stale-while-revalidate` and salvage for
//!   `stale-if-error`,
//! - protocol-compliance repairs for inbound requests and backend responses,
//! - automatic invalidation after unsafe methods (PUT, POST, DELETE, PATCH).
//!
//! Range and partial-content caching is unsupported; such exchanges pass
//! through untouched.
//!
//! The layer is parameterized by two abstractions: a [`Backend`] that
//! performs the actual exchange and a [`CacheStore`] that persists entries.
//! An [`InMemoryCacheStore`] is bundled.
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_cache_client::{
//!     Backend, BoxError, CacheConfig, CachingHttpClient, ExchangeContext,
//!     InMemoryCacheStore,
//! };
//!
//! struct PassThrough;
//!
//! #[async_trait::async_trait]
//! impl Backend for PassThrough {
//!     async fn execute(
//!         &self,
//!         _request: Request<Bytes>,
//!     ) -> Result<Response<Bytes>, BoxError> {
//!         Ok(Response::new(Bytes::from_static(b"hello")))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), http_cache_client::CacheError> {
//! let config = CacheConfig::default();
//! let store = InMemoryCacheStore::new(&config);
//! let client = CachingHttpClient::new(PassThrough, store, config);
//!
//! let request =
//!     Request::get("http://example.com/a").body(Bytes::new()).unwrap();
//! let mut context = ExchangeContext::new();
//! let response = client.execute(request, &mut context).await?;
//! println!("{:?} {:?}", response.status(), context.cache_response_status());
//! # Ok(())
//! # }
//! ```
mod cache_control;
mod client;
mod compliance;
mod conditional;
mod entry;
mod error;
mod generate;
mod managers;
mod policy;
mod resource;
mod revalidate;
mod store;
mod suitability;
mod validity;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Request, Response};
use serde::{Deserialize, Serialize};

pub use client::CachingHttpClient;
pub use compliance::{RequestProtocolCompliance, ResponseProtocolCompliance};
pub use conditional::ConditionalRequestBuilder;
pub use entry::{CacheEntry, Variant};
pub use error::{
    AllocationRejected, BoxError, CacheError, RequestProtocolError, Result,
};
pub use generate::CachedResponseGenerator;
pub use managers::memory::InMemoryCacheStore;
pub use policy::{CacheableRequestPolicy, ResponseCachingPolicy};
pub use resource::{HeapResourceFactory, Resource, ResourceFactory};
pub use revalidate::AsynchronousValidator;
pub use store::{CacheKeyGenerator, CacheStore};
pub use suitability::CachedResponseSuitabilityChecker;
pub use validity::CacheValidityPolicy;

// Custom headers used to indicate cache status (hit or miss)
/// `x-cache` header: HIT if the response was served from cache, MISS if not
pub const XCACHE: &str = "x-cache";
/// `x-cache-lookup` header: HIT if a response existed in cache, MISS if not
pub const XCACHELOOKUP: &str = "x-cache-lookup";

/// Dispatches a request to the origin. May block; failures surface as
/// [`CacheError::Transport`] unless a staleness salvage applies.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Performs one HTTP exchange.
    async fn execute(
        &self,
        request: Request<Bytes>,
    ) -> std::result::Result<Response<Bytes>, BoxError>;
}

/// How the caching layer produced a response, recorded on the
/// [`ExchangeContext`] after dispatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum CacheResponseStatus {
    /// The response came from the backend with no usable stored entry
    CacheMiss,
    /// The response was served from a stored entry
    CacheHit,
    /// A stored entry was used after successful revalidation
    Validated,
    /// The caching layer synthesized the response itself
    CacheModuleResponse,
}

/// Per-request context handed to [`CachingHttpClient::execute`]. Carries the
/// cache response status attribute, written last-write-wins.
#[derive(Debug, Default)]
pub struct ExchangeContext {
    cache_response_status: Option<CacheResponseStatus>,
}

impl ExchangeContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How the most recent dispatch through this context was answered.
    #[must_use]
    pub fn cache_response_status(&self) -> Option<CacheResponseStatus> {
        self.cache_response_status
    }

    /// Records how a response was produced.
    pub fn set_cache_response_status(&mut self, status: CacheResponseStatus) {
        self.cache_response_status = Some(status);
    }
}

/// Represents a basic cache status, used in the `x-cache` and
/// `x-cache-lookup` headers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HitOrMiss {
    /// Yes, there was a hit
    Hit,
    /// No, there was no hit
    Miss,
}

impl fmt::Display for HitOrMiss {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
        }
    }
}

/// Observational hit/miss/update counters. Relaxed atomics; values are
/// approximate under concurrency and never influence caching decisions.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    updates: AtomicU64,
}

impl CacheStats {
    /// Lookups that found a stored entry.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Successful revalidations of stored entries.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Configuration of the caching layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Bodies larger than this are not stored. Defaults to 8192.
    pub max_object_size_bytes: usize,
    /// Evaluate responses as a shared cache: `s-maxage` is honored,
    /// `private` is not storable. Defaults to `true`.
    pub shared_cache: bool,
    /// Assign heuristic freshness lifetimes (rfc2616 13.2.4) to responses
    /// without explicit freshness information. Defaults to `false`.
    pub heuristic_caching_enabled: bool,
    /// Fraction of the `Date` − `Last-Modified` interval used as the
    /// heuristic lifetime. Defaults to 0.1.
    pub heuristic_coefficient: f32,
    /// Heuristic lifetime when no `Last-Modified` is available, in seconds.
    /// Defaults to 0.
    pub heuristic_default_lifetime_secs: u64,
    /// How many times a conflicting entry update is retried before the
    /// unrefreshed entry is served. Defaults to 1.
    pub max_update_retries: usize,
    /// Upper bound on concurrently running background revalidations; 0
    /// disables the asynchronous path entirely. Defaults to 1.
    pub asynchronous_workers_max: usize,
    /// Advisory core pool size, accepted for tuning parity; the task-based
    /// pool sizes itself with `asynchronous_workers_max` alone.
    pub asynchronous_workers_core: usize,
    /// Advisory idle worker lifetime in seconds, accepted for tuning parity.
    pub asynchronous_worker_idle_lifetime_secs: u64,
    /// Upper bound on outstanding background revalidation tasks. Defaults
    /// to 100.
    pub revalidation_queue_size: usize,
    /// Pseudonym identifying this cache in `Via` and `Warning` headers.
    /// Defaults to `localhost`.
    pub via_pseudonym: String,
    /// Add advisory `x-cache` / `x-cache-lookup` headers to responses.
    /// Defaults to `false`.
    pub cache_status_headers: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_object_size_bytes: 8192,
            shared_cache: true,
            heuristic_caching_enabled: false,
            heuristic_coefficient: 0.1,
            heuristic_default_lifetime_secs: 0,
            max_update_retries: 1,
            asynchronous_workers_max: 1,
            asynchronous_workers_core: 1,
            asynchronous_worker_idle_lifetime_secs: 60,
            revalidation_queue_size: 100,
            via_pseudonym: "localhost".to_owned(),
            cache_status_headers: false,
        }
    }
}

pub(crate) trait HeaderMapExt {
    fn get_str(&self, name: &str) -> Option<&str>;
    fn get_date(&self, name: &str) -> Option<SystemTime>;
}

impl HeaderMapExt for HeaderMap {
    fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.to_str().ok()
    }

    fn get_date(&self, name: &str) -> Option<SystemTime> {
        httpdate::parse_http_date(self.get_str(name)?.trim()).ok()
    }
}

/// `http::Request` has no `Clone`; bodies here are refcounted buffers, so a
/// deep-enough copy is cheap.
pub(crate) fn clone_request(request: &Request<Bytes>) -> Request<Bytes> {
    let mut out = Request::new(request.body().clone());
    *out.method_mut() = request.method().clone();
    *out.uri_mut() = request.uri().clone();
    *out.version_mut() = request.version();
    *out.headers_mut() = request.headers().clone();
    out
}

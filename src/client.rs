use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use http::header::{
    ALLOW, CONTENT_TYPE, DATE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    MAX_FORWARDS, VIA,
};
use http::{
    HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Version,
};
use log::{debug, warn};

use crate::cache_control::CacheControl;
use crate::compliance::{RequestProtocolCompliance, ResponseProtocolCompliance};
use crate::conditional::ConditionalRequestBuilder;
use crate::entry::{CacheEntry, Variant};
use crate::error::RequestProtocolError;
use crate::generate::{add_warning, CachedResponseGenerator};
use crate::policy::{CacheableRequestPolicy, ResponseCachingPolicy};
use crate::revalidate::AsynchronousValidator;
use crate::store::{CacheKeyGenerator, CacheStore};
use crate::suitability::CachedResponseSuitabilityChecker;
use crate::validity::CacheValidityPolicy;
use crate::{
    clone_request, Backend, CacheConfig, CacheError, CacheResponseStatus,
    CacheStats, ExchangeContext, HeaderMapExt, HitOrMiss, Result, XCACHE,
    XCACHELOOKUP,
};

// 5xx statuses eligible for rfc5861 stale-if-error salvage
const STALE_IF_ERROR_STATUSES: &[u16] = &[500, 502, 503, 504];

/// Caching decorator around an HTTP [`Backend`].
///
/// For each request it decides between serving a stored response,
/// revalidating one conditionally, or forwarding unconditionally, then folds
/// the backend's answer back into the [`CacheStore`].
#[derive(Debug)]
pub struct CachingHttpClient<B: Backend, S: CacheStore> {
    backend: Arc<B>,
    store: Arc<S>,
    config: CacheConfig,
    validity: CacheValidityPolicy,
    request_policy: CacheableRequestPolicy,
    response_policy: ResponseCachingPolicy,
    suitability: CachedResponseSuitabilityChecker,
    conditional: ConditionalRequestBuilder,
    generator: CachedResponseGenerator,
    request_compliance: RequestProtocolCompliance,
    response_compliance: ResponseProtocolCompliance,
    keys: CacheKeyGenerator,
    validator: Option<AsynchronousValidator>,
    stats: Arc<CacheStats>,
}

impl<B: Backend, S: CacheStore> CachingHttpClient<B, S> {
    /// Composes the caching layer around `backend` and `store`.
    #[must_use]
    pub fn new(backend: B, store: S, config: CacheConfig) -> Self {
        let validity = CacheValidityPolicy::new(&config);
        let validator = (config.asynchronous_workers_max > 0)
            .then(|| AsynchronousValidator::new(&config));
        Self {
            backend: Arc::new(backend),
            store: Arc::new(store),
            validity,
            request_policy: CacheableRequestPolicy,
            response_policy: ResponseCachingPolicy::new(&config),
            suitability: CachedResponseSuitabilityChecker::new(validity),
            conditional: ConditionalRequestBuilder,
            generator: CachedResponseGenerator::new(
                validity,
                config.via_pseudonym.clone(),
            ),
            request_compliance: RequestProtocolCompliance,
            response_compliance: ResponseProtocolCompliance,
            keys: CacheKeyGenerator,
            validator,
            stats: Arc::new(CacheStats::default()),
            config,
        }
    }

    /// Observational hit/miss/update counters.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// The store this client persists entries into.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Dispatches `request`, serving from cache where the protocol allows.
    ///
    /// The context's cache response status records how the response was
    /// produced.
    pub async fn execute(
        &self,
        request: Request<Bytes>,
        context: &mut ExchangeContext,
    ) -> Result<Response<Bytes>> {
        context.set_cache_response_status(CacheResponseStatus::CacheMiss);

        if self.is_self_directed_options(&request) {
            context.set_cache_response_status(
                CacheResponseStatus::CacheModuleResponse,
            );
            return Ok(self.synthetic_options_response());
        }

        let errors =
            self.request_compliance.request_is_fatally_non_compliant(&request);
        if let Some(first) = errors.first() {
            debug!("request is fatally non-compliant: {first}");
            context.set_cache_response_status(
                CacheResponseStatus::CacheModuleResponse,
            );
            return Ok(self.error_response(*first));
        }

        let mut request = request;
        self.request_compliance.make_request_compliant(&mut request);
        let via_version = request.version();
        append_via(
            request.headers_mut(),
            via_version,
            &self.config.via_pseudonym,
        );

        if is_unsafe_method(request.method()) {
            if let Err(err) =
                self.store.flush_invalidated_cache_entries_for(&request).await
            {
                warn!("failed to flush invalidated cache entries: {err}");
            }
        }

        if !self.request_policy.is_servable_from_cache(&request) {
            debug!("request is not servable from cache, calling backend");
            if CacheControl::from_headers(request.headers()).has("no-store") {
                if let Err(err) =
                    self.store.flush_cache_entries_for(&request).await
                {
                    warn!("failed to flush cache entries: {err}");
                }
            }
            return self.call_backend_and_handle(&request).await;
        }

        let entry = match self.store.get_cache_entry(&request).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!("cache lookup failed: {err}");
                None
            }
        };

        match entry {
            Some(entry) => {
                self.stats.record_hit();
                self.handle_cache_hit(request, entry, context).await
            }
            None => {
                self.stats.record_miss();
                self.handle_cache_miss(request, context).await
            }
        }
    }

    async fn handle_cache_miss(
        &self,
        request: Request<Bytes>,
        context: &mut ExchangeContext,
    ) -> Result<Response<Bytes>> {
        debug!("cache miss for {}", request.uri());
        if only_if_cached(&request) {
            context.set_cache_response_status(
                CacheResponseStatus::CacheModuleResponse,
            );
            return Ok(self.gateway_timeout_response());
        }
        let variants = match self
            .store
            .get_variant_cache_entries_with_etags(&request)
            .await
        {
            Ok(variants) => variants,
            Err(err) => {
                warn!("variant lookup failed: {err}");
                HashMap::new()
            }
        };
        if !variants.is_empty() {
            return self
                .negotiate_response_from_variants(request, variants, context)
                .await;
        }
        self.call_backend_and_handle(&request).await
    }

    async fn handle_cache_hit(
        &self,
        request: Request<Bytes>,
        entry: Arc<CacheEntry>,
        context: &mut ExchangeContext,
    ) -> Result<Response<Bytes>> {
        let now = SystemTime::now();
        if self.suitability.can_cached_response_be_used(&request, &entry, now)
        {
            debug!("serving {} from cache", request.uri());
            context.set_cache_response_status(CacheResponseStatus::CacheHit);
            let mut response = if self.suitability.is_conditional(&request) {
                let mut response =
                    self.generator.generate_not_modified_response(&entry);
                let via_version = response.version();
                append_via(
                    response.headers_mut(),
                    via_version,
                    &self.config.via_pseudonym,
                );
                response
            } else {
                self.generator.generate_response(&entry, now)
            };
            if !self.validity.is_response_fresh(&entry, now) {
                add_warning(
                    response.headers_mut(),
                    &self.config.via_pseudonym,
                    110,
                    "Response is stale",
                );
            }
            self.set_cache_status(
                response.headers_mut(),
                HitOrMiss::Hit,
                HitOrMiss::Hit,
            );
            return Ok(response);
        }
        if only_if_cached(&request) {
            context.set_cache_response_status(
                CacheResponseStatus::CacheModuleResponse,
            );
            return Ok(self.gateway_timeout_response());
        }
        if self.validity.is_revalidatable(&entry) {
            return self.revalidate_cache_entry(request, entry, context).await;
        }
        self.call_backend_and_handle(&request).await
    }

    async fn revalidate_cache_entry(
        &self,
        request: Request<Bytes>,
        entry: Arc<CacheEntry>,
        context: &mut ExchangeContext,
    ) -> Result<Response<Bytes>> {
        let now = SystemTime::now();
        if let Some(validator) = &self.validator {
            let may_serve_stale = !self.validity.staleness_forbidden(&entry)
                && !request_forbids_stale(&request)
                && self
                    .validity
                    .may_return_stale_while_revalidating(&entry, now);
            if may_serve_stale {
                let cache_key = self.keys.cache_key(&request);
                let accepted = validator.revalidate_cache_entry(
                    cache_key,
                    Self::revalidate_in_background(
                        Arc::clone(&self.backend),
                        Arc::clone(&self.store),
                        self.conditional,
                        self.response_policy,
                        self.response_compliance,
                        self.config.via_pseudonym.clone(),
                        clone_request(&request),
                        Arc::clone(&entry),
                    ),
                );
                if !accepted {
                    debug!("background revalidation not scheduled");
                }
                context
                    .set_cache_response_status(CacheResponseStatus::CacheHit);
                let mut response = self.generator.generate_response(&entry, now);
                add_warning(
                    response.headers_mut(),
                    &self.config.via_pseudonym,
                    110,
                    "Response is stale",
                );
                self.set_cache_status(
                    response.headers_mut(),
                    HitOrMiss::Hit,
                    HitOrMiss::Hit,
                );
                return Ok(response);
            }
        }
        self.revalidate_cache_entry_sync(request, entry, context).await
    }

    async fn revalidate_cache_entry_sync(
        &self,
        request: Request<Bytes>,
        entry: Arc<CacheEntry>,
        context: &mut ExchangeContext,
    ) -> Result<Response<Bytes>> {
        debug!("revalidating {}", request.uri());
        let conditional =
            self.conditional.build_conditional_request(&request, &entry);
        let exchange = self.call_backend(conditional).await;
        let (request_date, mut response, response_date) = match exchange {
            Ok(exchange) => exchange,
            Err(err) => {
                let now = SystemTime::now();
                if !self.validity.staleness_forbidden(&entry)
                    && !request_forbids_stale(&request)
                {
                    warn!("revalidation failed, serving stale entry: {err}");
                    context.set_cache_response_status(
                        CacheResponseStatus::CacheHit,
                    );
                    let mut response =
                        self.generator.generate_response(&entry, now);
                    add_warning(
                        response.headers_mut(),
                        &self.config.via_pseudonym,
                        111,
                        "Revalidation failed",
                    );
                    self.set_cache_status(
                        response.headers_mut(),
                        HitOrMiss::Hit,
                        HitOrMiss::Hit,
                    );
                    return Ok(response);
                }
                debug!("revalidation failed and staleness is forbidden: {err}");
                context.set_cache_response_status(
                    CacheResponseStatus::CacheModuleResponse,
                );
                return Ok(self.gateway_timeout_response());
            }
        };
        self.response_compliance.ensure_protocol_compliance(&mut response);

        if response_predates_entry(&response, &entry) {
            debug!("backend clock skew detected, retrying unconditionally");
            return self.retry_unconditionally(&request).await;
        }

        let now = SystemTime::now();
        if response.status() == StatusCode::NOT_MODIFIED {
            context.set_cache_response_status(CacheResponseStatus::Validated);
            self.stats.record_update();
            let entry = self
                .update_entry_with_retries(
                    &request,
                    entry,
                    &response,
                    request_date,
                    response_date,
                )
                .await;
            let mut response = if self.suitability.is_conditional(&request)
                && self.suitability.all_conditionals_match(&request, &entry, now)
            {
                let mut response =
                    self.generator.generate_not_modified_response(&entry);
                let via_version = response.version();
                append_via(
                    response.headers_mut(),
                    via_version,
                    &self.config.via_pseudonym,
                );
                response
            } else {
                self.generator.generate_response(&entry, now)
            };
            self.set_cache_status(
                response.headers_mut(),
                HitOrMiss::Hit,
                HitOrMiss::Hit,
            );
            return Ok(response);
        }

        let salvageable = STALE_IF_ERROR_STATUSES
            .contains(&response.status().as_u16())
            && !self.validity.staleness_forbidden(&entry)
            && !request_forbids_stale(&request)
            && self.validity.may_return_stale_if_error(
                request.headers(),
                &entry,
                now,
            );
        if salvageable {
            debug!(
                "backend returned {}, serving stale entry",
                response.status()
            );
            context.set_cache_response_status(CacheResponseStatus::CacheHit);
            let mut response = self.generator.generate_response(&entry, now);
            add_warning(
                response.headers_mut(),
                &self.config.via_pseudonym,
                110,
                "Response is stale",
            );
            self.set_cache_status(
                response.headers_mut(),
                HitOrMiss::Hit,
                HitOrMiss::Hit,
            );
            return Ok(response);
        }

        if response.status() == StatusCode::OK {
            context.set_cache_response_status(CacheResponseStatus::Validated);
            self.stats.record_update();
        }
        let mut response = self
            .handle_backend_response(
                &request,
                response,
                request_date,
                response_date,
            )
            .await?;
        self.set_cache_status(
            response.headers_mut(),
            HitOrMiss::Miss,
            HitOrMiss::Hit,
        );
        Ok(response)
    }

    async fn negotiate_response_from_variants(
        &self,
        request: Request<Bytes>,
        variants: HashMap<String, Variant>,
        context: &mut ExchangeContext,
    ) -> Result<Response<Bytes>> {
        debug!(
            "negotiating among {} stored variants of {}",
            variants.len(),
            request.uri()
        );
        let conditional = self
            .conditional
            .build_conditional_request_from_variants(&request, &variants);
        let (request_date, mut response, response_date) =
            self.call_backend(clone_request(&conditional)).await?;

        if response.status() != StatusCode::NOT_MODIFIED {
            return self
                .handle_backend_response(
                    &request,
                    response,
                    request_date,
                    response_date,
                )
                .await;
        }
        self.response_compliance.ensure_protocol_compliance(&mut response);

        let etag = response
            .headers()
            .get_str(ETAG.as_str())
            .map(|etag| etag.trim().to_owned());
        let Some(etag) = etag else {
            warn!("304 without ETag during variant negotiation, retrying");
            return self.retry_unconditionally(&request).await;
        };
        let Some(variant) = variants.get(etag.as_str()) else {
            warn!("304 with unknown ETag {etag}, retrying");
            return self.retry_unconditionally(&request).await;
        };
        if response_predates_entry(&response, variant.entry()) {
            debug!("backend clock skew detected, retrying unconditionally");
            return self.retry_unconditionally(&request).await;
        }

        context.set_cache_response_status(CacheResponseStatus::Validated);
        self.stats.record_update();
        let updated = match self
            .store
            .update_variant_cache_entry(
                &conditional,
                Arc::clone(variant.entry()),
                &response,
                request_date,
                response_date,
                variant.cache_key(),
            )
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                warn!("variant update failed: {err}");
                Arc::clone(variant.entry())
            }
        };
        let updated_variant = Variant::new(
            variant.variant_key().to_owned(),
            variant.cache_key().to_owned(),
            Arc::clone(&updated),
        );
        if let Err(err) = self
            .store
            .reuse_variant_entry_for(&request, &updated_variant)
            .await
        {
            warn!("failed to promote variant entry: {err}");
        }
        let mut response =
            self.generator.generate_response(&updated, SystemTime::now());
        self.set_cache_status(
            response.headers_mut(),
            HitOrMiss::Hit,
            HitOrMiss::Hit,
        );
        Ok(response)
    }

    /// End-to-end reload after clock skew or an unusable `304`.
    async fn retry_unconditionally(
        &self,
        request: &Request<Bytes>,
    ) -> Result<Response<Bytes>> {
        let unconditional =
            self.conditional.build_unconditional_request(request);
        let (request_date, response, response_date) =
            self.call_backend(unconditional).await?;
        self.handle_backend_response(
            request,
            response,
            request_date,
            response_date,
        )
        .await
    }

    async fn call_backend(
        &self,
        request: Request<Bytes>,
    ) -> Result<(SystemTime, Response<Bytes>, SystemTime)> {
        let request_date = SystemTime::now();
        let response = self
            .backend
            .execute(request)
            .await
            .map_err(CacheError::Transport)?;
        Ok((request_date, response, SystemTime::now()))
    }

    async fn call_backend_and_handle(
        &self,
        request: &Request<Bytes>,
    ) -> Result<Response<Bytes>> {
        let (request_date, response, response_date) =
            self.call_backend(clone_request(request)).await?;
        self.handle_backend_response(
            request,
            response,
            request_date,
            response_date,
        )
        .await
    }

    /// Folds a backend response into the cache and hands it back.
    async fn handle_backend_response(
        &self,
        request: &Request<Bytes>,
        mut response: Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Result<Response<Bytes>> {
        if response.status() == StatusCode::NOT_MODIFIED
            && !request.headers().contains_key(IF_NONE_MATCH)
            && !request.headers().contains_key(IF_MODIFIED_SINCE)
        {
            return Err(CacheError::Protocol(
                "backend returned 304 to an unconditional request".to_owned(),
            ));
        }
        self.response_compliance.ensure_protocol_compliance(&mut response);
        let via_version = response.version();
        append_via(
            response.headers_mut(),
            via_version,
            &self.config.via_pseudonym,
        );
        self.set_cache_status(
            response.headers_mut(),
            HitOrMiss::Miss,
            HitOrMiss::Miss,
        );

        if !self.response_policy.is_response_cacheable(request, &response) {
            if let Err(err) = self.store.flush_cache_entries_for(request).await
            {
                warn!("failed to flush uncacheable target: {err}");
            }
            return Ok(response);
        }

        // a concurrent exchange may have stored a newer representation
        if let Ok(Some(existing)) = self.store.get_cache_entry(request).await {
            let newer = match (
                existing.date(),
                response.headers().get_date(DATE.as_str()),
            ) {
                (Some(stored), Some(received)) => received < stored,
                _ => false,
            };
            if newer {
                debug!("stored entry is newer than backend response");
                return Ok(response);
            }
        }

        match self
            .store
            .cache_and_return_response(
                request,
                &response,
                request_date,
                response_date,
            )
            .await
        {
            Ok(mut stored) => {
                self.set_cache_status(
                    stored.headers_mut(),
                    HitOrMiss::Miss,
                    HitOrMiss::Miss,
                );
                Ok(stored)
            }
            Err(err) => {
                warn!("response could not be cached: {err}");
                if let Err(err) =
                    self.store.flush_cache_entries_for(request).await
                {
                    warn!("failed to flush cache entries: {err}");
                }
                Ok(response)
            }
        }
    }

    /// Replaces `entry` with its 304-refreshed copy, retrying storage
    /// conflicts up to the configured limit. Falls back to the unrefreshed
    /// entry when every attempt fails; storage trouble never fails the
    /// request.
    async fn update_entry_with_retries(
        &self,
        request: &Request<Bytes>,
        entry: Arc<CacheEntry>,
        not_modified: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Arc<CacheEntry> {
        let mut current = entry;
        for attempt in 0..=self.config.max_update_retries {
            // variant entries are stored under their variant cache key; the
            // root entry and its variant map must survive the update
            let result = match current.variant_key() {
                Some(variant_key) => {
                    let variant_cache_key = self.keys.variant_cache_key(
                        variant_key,
                        &self.keys.cache_key(request),
                    );
                    self.store
                        .update_variant_cache_entry(
                            request,
                            Arc::clone(&current),
                            not_modified,
                            request_date,
                            response_date,
                            &variant_cache_key,
                        )
                        .await
                }
                None => {
                    self.store
                        .update_cache_entry(
                            request,
                            Arc::clone(&current),
                            not_modified,
                            request_date,
                            response_date,
                        )
                        .await
                }
            };
            match result {
                Ok(updated) => return updated,
                Err(err) => {
                    warn!("cache update failed (attempt {attempt}): {err}");
                    if let Ok(Some(latest)) =
                        self.store.get_cache_entry(request).await
                    {
                        current = latest;
                    }
                }
            }
        }
        current
    }

    /// Background half of `stale-while-revalidate`: revalidates the entry and
    /// folds the outcome into the store, swallowing failures.
    #[allow(clippy::too_many_arguments)]
    async fn revalidate_in_background(
        backend: Arc<B>,
        store: Arc<S>,
        conditional: ConditionalRequestBuilder,
        response_policy: ResponseCachingPolicy,
        response_compliance: ResponseProtocolCompliance,
        via_pseudonym: String,
        request: Request<Bytes>,
        entry: Arc<CacheEntry>,
    ) {
        let conditional_request =
            conditional.build_conditional_request(&request, &entry);
        let mut request_date = SystemTime::now();
        let mut response =
            match backend.execute(conditional_request).await {
                Ok(response) => response,
                Err(err) => {
                    warn!("background revalidation failed: {err}");
                    return;
                }
            };
        let mut response_date = SystemTime::now();
        response_compliance.ensure_protocol_compliance(&mut response);

        if response_predates_entry(&response, &entry) {
            debug!("clock skew during background revalidation, retrying");
            let unconditional =
                conditional.build_unconditional_request(&request);
            request_date = SystemTime::now();
            response = match backend.execute(unconditional).await {
                Ok(response) => response,
                Err(err) => {
                    warn!("background revalidation retry failed: {err}");
                    return;
                }
            };
            response_date = SystemTime::now();
            response_compliance.ensure_protocol_compliance(&mut response);
            if response.status() == StatusCode::NOT_MODIFIED {
                warn!("backend returned 304 to an unconditional request");
                return;
            }
        }

        if response.status() == StatusCode::NOT_MODIFIED {
            let keys = CacheKeyGenerator;
            let result = match entry.variant_key() {
                Some(variant_key) => {
                    let variant_cache_key = keys
                        .variant_cache_key(variant_key, &keys.cache_key(&request));
                    store
                        .update_variant_cache_entry(
                            &request,
                            entry,
                            &response,
                            request_date,
                            response_date,
                            &variant_cache_key,
                        )
                        .await
                }
                None => {
                    store
                        .update_cache_entry(
                            &request,
                            entry,
                            &response,
                            request_date,
                            response_date,
                        )
                        .await
                }
            };
            if let Err(err) = result {
                warn!("background cache update failed: {err}");
            }
            return;
        }

        let via_version = response.version();
        append_via(
            response.headers_mut(),
            via_version,
            &via_pseudonym,
        );
        if response_policy.is_response_cacheable(&request, &response) {
            if let Err(err) = store
                .cache_and_return_response(
                    &request,
                    &response,
                    request_date,
                    response_date,
                )
                .await
            {
                warn!("background cache store failed: {err}");
            }
        } else if let Err(err) =
            store.flush_cache_entries_for(&request).await
        {
            warn!("failed to flush stale target: {err}");
        }
    }

    fn is_self_directed_options(&self, request: &Request<Bytes>) -> bool {
        request.method() == Method::OPTIONS
            && request.uri().path() == "*"
            && request
                .headers()
                .get_str(MAX_FORWARDS.as_str())
                .is_some_and(|v| v.trim() == "0")
    }

    fn synthetic_options_response(&self) -> Response<Bytes> {
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = StatusCode::OK;
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS"));
        self.stamp_synthetic(&mut response);
        response
    }

    fn gateway_timeout_response(&self) -> Response<Bytes> {
        let mut response = Response::new(Bytes::from_static(b"Gateway Timeout"));
        *response.status_mut() = StatusCode::GATEWAY_TIMEOUT;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.stamp_synthetic(&mut response);
        response
    }

    fn error_response(&self, error: RequestProtocolError) -> Response<Bytes> {
        let mut response = Response::new(Bytes::from(error.to_string()));
        *response.status_mut() = error.status();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.stamp_synthetic(&mut response);
        response
    }

    fn stamp_synthetic(&self, response: &mut Response<Bytes>) {
        let date = httpdate::fmt_http_date(SystemTime::now());
        if let Ok(value) = HeaderValue::from_str(&date) {
            response.headers_mut().insert(DATE, value);
        }
        let via_version = response.version();
        append_via(
            response.headers_mut(),
            via_version,
            &self.config.via_pseudonym,
        );
    }

    fn set_cache_status(
        &self,
        headers: &mut HeaderMap,
        response_status: HitOrMiss,
        lookup_status: HitOrMiss,
    ) {
        if !self.config.cache_status_headers {
            return;
        }
        if let Ok(value) = HeaderValue::from_str(&response_status.to_string())
        {
            headers.insert(XCACHE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&lookup_status.to_string()) {
            headers.insert(XCACHELOOKUP, value);
        }
    }
}

fn is_unsafe_method(method: &Method) -> bool {
    *method == Method::PUT
        || *method == Method::POST
        || *method == Method::DELETE
        || *method == Method::PATCH
}

fn only_if_cached(request: &Request<Bytes>) -> bool {
    CacheControl::from_headers(request.headers()).has("only-if-cached")
}

fn request_forbids_stale(request: &Request<Bytes>) -> bool {
    let cc = CacheControl::from_headers(request.headers());
    cc.has("no-cache") || cc.has("no-store") || cc.has("min-fresh")
}

/// rfc2616 13.2.6: a validated response whose `Date` is older than the stored
/// entry's must not be used to update it.
fn response_predates_entry(
    response: &Response<Bytes>,
    entry: &CacheEntry,
) -> bool {
    match (entry.date(), response.headers().get_date("date")) {
        (Some(stored), Some(received)) => received < stored,
        _ => false,
    }
}

/// Appends this cache's identity to `Via`. The protocol token is omitted for
/// plain `http`, matching the common proxy shorthand.
fn append_via(headers: &mut HeaderMap, version: Version, pseudonym: &str) {
    let received_protocol = if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2.0"
    } else if version == Version::HTTP_3 {
        "3.0"
    } else {
        "1.1"
    };
    let via = format!(
        "{received_protocol} {pseudonym} ({}/{} (cache))",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );
    if let Ok(value) = HeaderValue::from_str(&via) {
        headers.append(VIA, value);
    }
}

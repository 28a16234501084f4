use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_LOCATION, LOCATION, VARY};
use http::{Request, Response};
use url::Url;

use crate::entry::{CacheEntry, Variant};
use crate::error::BoxError;
use crate::resource::{HeapResourceFactory, ResourceFactory};
use crate::store::{CacheKeyGenerator, CacheStore};
use crate::{CacheConfig, HeaderMapExt};

/// Implements [`CacheStore`] with a locked in-process map.
///
/// All operations take the single map lock, which makes every update and
/// invalidation atomic with respect to lookups on the same key.
#[derive(Clone)]
pub struct InMemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, Arc<CacheEntry>>>>,
    factory: Arc<dyn ResourceFactory>,
    keys: CacheKeyGenerator,
}

impl std::fmt::Debug for InMemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCacheStore").finish_non_exhaustive()
    }
}

impl InMemoryCacheStore {
    /// Creates a store whose bodies are capped by the configured maximum
    /// object size.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_resource_factory(Arc::new(HeapResourceFactory::new(
            config.max_object_size_bytes,
        )))
    }

    /// Creates a store around a custom body allocator.
    #[must_use]
    pub fn with_resource_factory(factory: Arc<dyn ResourceFactory>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            factory,
            keys: CacheKeyGenerator,
        }
    }

    /// Clears out the entire cache.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Number of stored entries, roots and variants included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_from_response(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Result<CacheEntry, BoxError> {
        let resource = self.factory.generate(response.body())?;
        let variant_key = response
            .headers()
            .contains_key(VARY)
            .then(|| self.keys.variant_key_from_headers(request, response.headers()));
        Ok(CacheEntry::new(
            request_date,
            response_date,
            request.method().clone(),
            response.status(),
            response.version(),
            response.headers().clone(),
            resource,
            variant_key,
        ))
    }

    fn response_from_entry(entry: &CacheEntry) -> Response<Bytes> {
        let mut response = Response::new(entry.resource().bytes());
        *response.status_mut() = entry.status();
        *response.version_mut() = entry.version();
        *response.headers_mut() = entry.headers().clone();
        response
    }

    fn remove_with_variants(
        entries: &mut HashMap<String, Arc<CacheEntry>>,
        key: &str,
    ) {
        if let Some(root) = entries.remove(key) {
            for variant_cache_key in root.variant_map().values() {
                entries.remove(variant_cache_key);
            }
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get_cache_entry(
        &self,
        request: &Request<Bytes>,
    ) -> Result<Option<Arc<CacheEntry>>, BoxError> {
        let key = self.keys.cache_key(request);
        let entries = self.entries.lock().unwrap();
        let Some(root) = entries.get(&key) else { return Ok(None) };
        if !root.has_variants() {
            return Ok(Some(Arc::clone(root)));
        }
        let variant_key = self.keys.variant_key(request, root);
        Ok(root
            .variant_map()
            .get(&variant_key)
            .and_then(|variant_cache_key| entries.get(variant_cache_key))
            .map(Arc::clone))
    }

    async fn get_variant_cache_entries_with_etags(
        &self,
        request: &Request<Bytes>,
    ) -> Result<HashMap<String, Variant>, BoxError> {
        let key = self.keys.cache_key(request);
        let entries = self.entries.lock().unwrap();
        let mut out = HashMap::new();
        let Some(root) = entries.get(&key) else { return Ok(out) };
        for (variant_key, variant_cache_key) in root.variant_map() {
            let Some(entry) = entries.get(variant_cache_key) else { continue };
            if let Some(etag) = entry.etag() {
                out.insert(
                    etag.to_string(),
                    Variant::new(
                        variant_key.clone(),
                        variant_cache_key.clone(),
                        Arc::clone(entry),
                    ),
                );
            }
        }
        Ok(out)
    }

    async fn cache_and_return_response(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Result<Response<Bytes>, BoxError> {
        let entry = self.entry_from_response(
            request,
            response,
            request_date,
            response_date,
        )?;
        let key = self.keys.cache_key(request);
        let mut entries = self.entries.lock().unwrap();
        match entry.variant_key() {
            Some(variant_key) => {
                let variant_cache_key =
                    self.keys.variant_cache_key(variant_key, &key);
                let mut variant_map = entries
                    .get(&key)
                    .map(|root| root.variant_map().clone())
                    .unwrap_or_default();
                variant_map.insert(
                    variant_key.to_string(),
                    variant_cache_key.clone(),
                );
                let entry = Arc::new(entry);
                entries.insert(variant_cache_key, Arc::clone(&entry));
                entries.insert(
                    key,
                    Arc::new(entry.with_variant_map(variant_map)),
                );
                Ok(Self::response_from_entry(&entry))
            }
            None => {
                let entry = Arc::new(entry);
                entries.insert(key, Arc::clone(&entry));
                Ok(Self::response_from_entry(&entry))
            }
        }
    }

    async fn update_cache_entry(
        &self,
        request: &Request<Bytes>,
        entry: Arc<CacheEntry>,
        not_modified: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
    ) -> Result<Arc<CacheEntry>, BoxError> {
        let resource = self.factory.copy(entry.resource())?;
        let updated = Arc::new(
            entry
                .with_updated_headers(
                    not_modified.headers(),
                    request_date,
                    response_date,
                )
                .with_resource(resource),
        );
        let key = self.keys.cache_key(request);
        self.entries.lock().unwrap().insert(key, Arc::clone(&updated));
        Ok(updated)
    }

    async fn update_variant_cache_entry(
        &self,
        _conditional_request: &Request<Bytes>,
        entry: Arc<CacheEntry>,
        not_modified: &Response<Bytes>,
        request_date: SystemTime,
        response_date: SystemTime,
        variant_cache_key: &str,
    ) -> Result<Arc<CacheEntry>, BoxError> {
        let resource = self.factory.copy(entry.resource())?;
        let updated = Arc::new(
            entry
                .with_updated_headers(
                    not_modified.headers(),
                    request_date,
                    response_date,
                )
                .with_resource(resource),
        );
        self.entries
            .lock()
            .unwrap()
            .insert(variant_cache_key.to_string(), Arc::clone(&updated));
        Ok(updated)
    }

    async fn reuse_variant_entry_for(
        &self,
        request: &Request<Bytes>,
        variant: &Variant,
    ) -> Result<(), BoxError> {
        let key = self.keys.cache_key(request);
        let variant_key = self
            .keys
            .variant_key_from_headers(request, variant.entry().headers());
        let variant_cache_key =
            self.keys.variant_cache_key(&variant_key, &key);
        // bind a copy of the validated entry to this request's selecting
        // values; the body resource is shared, not duplicated
        let rebound =
            Arc::new(variant.entry().with_variant_key(variant_key.clone()));
        let mut entries = self.entries.lock().unwrap();
        let mut variant_map = entries
            .get(&key)
            .map(|root| root.variant_map().clone())
            .unwrap_or_default();
        variant_map.insert(variant_key, variant_cache_key.clone());
        entries.insert(variant_cache_key, Arc::clone(&rebound));
        let root = rebound.with_variant_map(variant_map);
        entries.insert(key, Arc::new(root));
        Ok(())
    }

    async fn flush_cache_entries_for(
        &self,
        request: &Request<Bytes>,
    ) -> Result<(), BoxError> {
        let key = self.keys.cache_key(request);
        let mut entries = self.entries.lock().unwrap();
        Self::remove_with_variants(&mut entries, &key);
        Ok(())
    }

    async fn flush_invalidated_cache_entries_for(
        &self,
        request: &Request<Bytes>,
    ) -> Result<(), BoxError> {
        let key = self.keys.cache_key(request);
        let base = Url::parse(&key).ok();
        let mut entries = self.entries.lock().unwrap();
        Self::remove_with_variants(&mut entries, &key);
        for name in [LOCATION, CONTENT_LOCATION] {
            let Some(target) = request.headers().get_str(name.as_str()) else {
                continue;
            };
            let resolved = match &base {
                Some(base) => base.join(target).ok(),
                None => Url::parse(target).ok(),
            };
            let Some(resolved) = resolved else { continue };
            // only same-host targets may be invalidated (rfc2616 13.10)
            let same_host = base
                .as_ref()
                .is_some_and(|b| b.host_str() == resolved.host_str());
            if same_host {
                Self::remove_with_variants(
                    &mut entries,
                    resolved.as_str(),
                );
            }
        }
        Ok(())
    }
}

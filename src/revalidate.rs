use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::Semaphore;

use crate::CacheConfig;

/// Bounded worker pool for `stale-while-revalidate` background revalidations.
///
/// At most one task may be outstanding per cache key (single-flight); total
/// outstanding tasks are capped by the configured queue size, and concurrent
/// execution by the configured worker maximum.
#[derive(Debug, Clone)]
pub struct AsynchronousValidator {
    workers: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    queue_capacity: usize,
}

impl AsynchronousValidator {
    /// Builds the pool from the cache configuration. Callers should not
    /// construct one when `asynchronous_workers_max` is zero.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(
                config.asynchronous_workers_max.max(1),
            )),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            queue_capacity: config.revalidation_queue_size.max(1),
        }
    }

    /// Submits a revalidation for `cache_key`, unless one is already in
    /// flight for that key or the queue is full. Returns whether the task
    /// was accepted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn revalidate_cache_entry<F>(&self, cache_key: String, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if in_flight.len() >= self.queue_capacity {
                debug!(
                    "revalidation queue full, not revalidating {cache_key}"
                );
                return false;
            }
            if !in_flight.insert(cache_key.clone()) {
                debug!("revalidation already in flight for {cache_key}");
                return false;
            }
        }
        let marker = InFlightMarker {
            in_flight: Arc::clone(&self.in_flight),
            cache_key,
        };
        let workers = Arc::clone(&self.workers);
        tokio::spawn(async move {
            // marker is dropped (and the key released) even if task panics
            let _marker = marker;
            let Ok(_permit) = workers.acquire().await else { return };
            task.await;
        });
        true
    }

    /// Whether a revalidation for `cache_key` is currently outstanding.
    #[must_use]
    pub fn is_queued(&self, cache_key: &str) -> bool {
        self.in_flight.lock().unwrap().contains(cache_key)
    }
}

struct InFlightMarker {
    in_flight: Arc<Mutex<HashSet<String>>>,
    cache_key: String,
}

impl Drop for InFlightMarker {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap().remove(&self.cache_key);
    }
}

use bytes::Bytes;

use crate::error::{AllocationRejected, BoxError};

/// Handle to the stored bytes of one response body.
///
/// Cloning is refcounted; the underlying allocation is released when the last
/// clone drops, so observers of a replaced cache entry keep a working body
/// until they finish with it.
#[derive(Debug, Clone)]
pub struct Resource {
    bytes: Bytes,
}

impl Resource {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    /// A cheap refcounted view of the stored bytes.
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Stored body length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the stored body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Allocates body storage for cache entries.
///
/// A factory may refuse a body (size cap, backpressure); the caching layer
/// treats a refusal as "response not cacheable" and passes the response
/// through to the caller untouched.
pub trait ResourceFactory: Send + Sync + 'static {
    /// Copies `body` into a fresh [`Resource`].
    fn generate(&self, body: &Bytes) -> Result<Resource, BoxError>;

    /// Duplicates an existing resource, e.g. when an updated entry inherits
    /// the prior entry's body.
    fn copy(&self, resource: &Resource) -> Result<Resource, BoxError>;
}

/// [`ResourceFactory`] keeping bodies on the heap, bounded by the configured
/// maximum object size. Oversized bodies are refused with
/// [`AllocationRejected`].
#[derive(Debug, Clone, Copy)]
pub struct HeapResourceFactory {
    max_object_size: usize,
}

impl HeapResourceFactory {
    /// Creates a factory refusing bodies larger than `max_object_size` bytes.
    #[must_use]
    pub fn new(max_object_size: usize) -> Self {
        Self { max_object_size }
    }
}

impl ResourceFactory for HeapResourceFactory {
    fn generate(&self, body: &Bytes) -> Result<Resource, BoxError> {
        if body.len() > self.max_object_size {
            return Err(AllocationRejected {
                size: body.len(),
                max_object_size: self.max_object_size,
            }
            .into());
        }
        Ok(Resource::new(body.clone()))
    }

    fn copy(&self, resource: &Resource) -> Result<Resource, BoxError> {
        // Same ceiling applies; an inherited body was already admitted once.
        self.generate(&resource.bytes())
    }
}

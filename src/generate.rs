use std::time::{Duration, SystemTime};

use bytes::Bytes;
use http::header::{
    AGE, CACHE_CONTROL, CONTENT_LOCATION, DATE, ETAG, EXPIRES, VARY, WARNING,
};
use http::{HeaderMap, HeaderValue, Response, StatusCode};

use crate::entry::CacheEntry;
use crate::validity::CacheValidityPolicy;

const ONE_DAY: Duration = Duration::from_secs(86_400);

// rfc2616 10.3.5: headers a 304 must carry when they exist on the entity
const NOT_MODIFIED_HEADERS: [http::header::HeaderName; 6] =
    [DATE, ETAG, CONTENT_LOCATION, EXPIRES, CACHE_CONTROL, VARY];

/// Materializes stored entries into HTTP responses.
#[derive(Debug, Clone)]
pub struct CachedResponseGenerator {
    validity: CacheValidityPolicy,
    pseudonym: String,
}

impl CachedResponseGenerator {
    /// Builds the generator around the freshness arithmetic and the warn-agent
    /// pseudonym in use.
    #[must_use]
    pub fn new(validity: CacheValidityPolicy, pseudonym: String) -> Self {
        Self { validity, pseudonym }
    }

    /// Full response over the stored body, with a current `Age` header.
    #[must_use]
    pub fn generate_response(
        &self,
        entry: &CacheEntry,
        now: SystemTime,
    ) -> Response<Bytes> {
        let mut response = Response::new(entry.resource().bytes());
        *response.status_mut() = entry.status();
        *response.version_mut() = entry.version();
        *response.headers_mut() = entry.headers().clone();

        let age = self.validity.current_age(entry, now);
        if let Ok(value) = HeaderValue::from_str(&age.as_secs().to_string()) {
            response.headers_mut().insert(AGE, value);
        }
        if age >= ONE_DAY
            && self.validity.freshness_lifetime(entry) > ONE_DAY
            && !self.validity.has_explicit_freshness(entry)
        {
            add_warning(
                response.headers_mut(),
                &self.pseudonym,
                113,
                "Heuristic expiration",
            );
        }
        response
    }

    /// `304 Not Modified` projection of the entry, carrying only the headers
    /// rfc2616 10.3.5 asks for.
    #[must_use]
    pub fn generate_not_modified_response(
        &self,
        entry: &CacheEntry,
    ) -> Response<Bytes> {
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        *response.version_mut() = entry.version();
        for name in NOT_MODIFIED_HEADERS {
            for value in entry.headers().get_all(&name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
        response
    }
}

/// Appends a `Warning` header in the `<code> <agent> "<text>"` form.
pub(crate) fn add_warning(
    headers: &mut HeaderMap,
    pseudonym: &str,
    code: u16,
    text: &str,
) {
    let warning = format!("{code} {pseudonym} \"{text}\"");
    if let Ok(value) = HeaderValue::from_str(&warning) {
        headers.append(WARNING, value);
    }
}

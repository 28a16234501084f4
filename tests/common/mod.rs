#![allow(dead_code)]

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Request, Response};
use http_cache_client::{
    Backend, BoxError, CacheConfig, CachingHttpClient, InMemoryCacheStore,
};

/// Scripted backend: hands out queued responses in order and records every
/// request it receives.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    responses: Mutex<VecDeque<Response<Bytes>>>,
    requests: Mutex<Vec<Request<Bytes>>>,
}

impl MockBackend {
    pub fn push_response(&self, response: Response<Bytes>) {
        self.inner.responses.lock().unwrap().push_back(response);
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    pub fn request_method(&self, index: usize) -> String {
        self.inner.requests.lock().unwrap()[index].method().to_string()
    }

    pub fn request_header(&self, index: usize, name: &str) -> Option<String> {
        self.inner.requests.lock().unwrap()[index]
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    pub fn request_has_header(&self, index: usize, name: &str) -> bool {
        self.request_header(index, name).is_some()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn execute(
        &self,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, BoxError> {
        self.inner.requests.lock().unwrap().push(request);
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BoxError::from("backend is unreachable"))
    }
}

pub fn make_client(
    config: CacheConfig,
) -> (CachingHttpClient<MockBackend, InMemoryCacheStore>, MockBackend) {
    let backend = MockBackend::default();
    let store = InMemoryCacheStore::new(&config);
    (CachingHttpClient::new(backend.clone(), store, config), backend)
}

pub fn get(uri: &str) -> Request<Bytes> {
    get_with(uri, &[])
}

pub fn get_with(uri: &str, header_pairs: &[(&str, &str)]) -> Request<Bytes> {
    let mut request = Request::new(Bytes::new());
    *request.uri_mut() = uri.parse().unwrap();
    *request.headers_mut() = headers(header_pairs);
    request
}

pub fn response(
    status: u16,
    header_pairs: &[(&str, &str)],
    body: &str,
) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(body.to_owned()));
    *response.status_mut() = status.try_into().unwrap();
    *response.headers_mut() = headers(header_pairs);
    response
}

pub fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(
            HeaderName::from_str(name).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

/// An HTTP-date `offset_secs` away from now (negative values lie in the
/// past).
pub fn http_date(offset_secs: i64) -> String {
    let now = SystemTime::now();
    let stamp = if offset_secs >= 0 {
        now + Duration::from_secs(offset_secs as u64)
    } else {
        now - Duration::from_secs(offset_secs.unsigned_abs())
    };
    httpdate::fmt_http_date(stamp)
}

pub fn body_text(response: &Response<Bytes>) -> String {
    String::from_utf8_lossy(response.body()).into_owned()
}

pub fn via_count(response: &Response<Bytes>) -> usize {
    response
        .headers()
        .get_all("via")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.contains("(cache)"))
        .count()
}

pub fn warning_codes(response: &Response<Bytes>) -> Vec<u16> {
    response
        .headers()
        .get_all("warning")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split_whitespace().next()?.parse().ok())
        .collect()
}

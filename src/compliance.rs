use std::time::SystemTime;

use bytes::Bytes;
use http::header::{
    AGE, CACHE_CONTROL, CONTENT_LENGTH, DATE, EXPECT, IF_RANGE, MAX_FORWARDS,
};
use http::{HeaderValue, Method, Request, Response, Version};
use log::{debug, warn};

use crate::cache_control::CacheControl;
use crate::error::RequestProtocolError;
use crate::HeaderMapExt;

const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "TRACE", "PATCH",
    "CONNECT",
];

/// Inspects and normalizes outbound requests before the cache acts on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestProtocolCompliance;

impl RequestProtocolCompliance {
    /// Fatal violations that short-circuit to a synthesized error response.
    #[must_use]
    pub fn request_is_fatally_non_compliant(
        &self,
        request: &Request<Bytes>,
    ) -> Vec<RequestProtocolError> {
        let mut errors = Vec::new();
        if !KNOWN_METHODS.contains(&request.method().as_str()) {
            errors.push(RequestProtocolError::UnknownMethod);
        }
        if request
            .headers()
            .get_str(IF_RANGE.as_str())
            .is_some_and(|v| v.trim_start().starts_with("W/"))
        {
            errors.push(RequestProtocolError::WeakEtagOnRange);
        }
        if request.headers().get_str(EXPECT.as_str()).is_some_and(|v| {
            !v.trim().eq_ignore_ascii_case("100-continue")
        }) {
            errors.push(RequestProtocolError::InvalidExpectDirective);
        }
        if request.version() == Version::HTTP_2
            || request.version() == Version::HTTP_3
        {
            errors.push(RequestProtocolError::UnsupportedHttpVersion);
        }
        errors
    }

    /// Repairs what can be repaired: a malformed `Max-Forwards` on `OPTIONS`
    /// is dropped, repeated cache directives are collapsed to one header.
    pub fn make_request_compliant(&self, request: &mut Request<Bytes>) {
        if request.method() == Method::OPTIONS {
            let malformed = request
                .headers()
                .get_str(MAX_FORWARDS.as_str())
                .is_some_and(|v| v.trim().parse::<u32>().is_err());
            if malformed {
                debug!("dropping malformed Max-Forwards from OPTIONS request");
                request.headers_mut().remove(MAX_FORWARDS);
            }
        }
        let cc = CacheControl::from_headers(request.headers());
        if request.headers().get_all(CACHE_CONTROL).iter().count() > 1
            || cc.had_conflicts()
        {
            if cc.had_conflicts() {
                debug!("request carried conflicting cache directives");
            }
            request.headers_mut().remove(CACHE_CONTROL);
            if !cc.is_empty() {
                if let Ok(value) = HeaderValue::from_str(&cc.to_header_value())
                {
                    request.headers_mut().insert(CACHE_CONTROL, value);
                }
            }
        }
    }
}

/// Makes backend responses usable before they are stored or returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseProtocolCompliance;

impl ResponseProtocolCompliance {
    /// Repairs the response in place: synthesizes a missing `Date`, collapses
    /// duplicate `Content-Length`, clamps `Age` to zero or above.
    pub fn ensure_protocol_compliance(&self, response: &mut Response<Bytes>) {
        if !response.headers().contains_key(DATE) {
            let now = httpdate::fmt_http_date(SystemTime::now());
            if let Ok(value) = HeaderValue::from_str(&now) {
                response.headers_mut().insert(DATE, value);
            }
        }
        self.collapse_content_length(response);
        // negative and unparseable ages alike count as zero
        let invalid_age = response
            .headers()
            .get_str(AGE.as_str())
            .is_some_and(|v| v.trim().parse::<u64>().is_err());
        if invalid_age {
            response
                .headers_mut()
                .insert(AGE, HeaderValue::from_static("0"));
        }
    }

    fn collapse_content_length(&self, response: &mut Response<Bytes>) {
        let lengths: Vec<String> = response
            .headers()
            .get_all(CONTENT_LENGTH)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| v.trim().to_owned())
            .collect();
        if lengths.len() <= 1 {
            return;
        }
        if lengths.iter().all(|l| *l == lengths[0]) {
            let first = lengths[0].clone();
            response.headers_mut().remove(CONTENT_LENGTH);
            if let Ok(value) = HeaderValue::from_str(&first) {
                response.headers_mut().insert(CONTENT_LENGTH, value);
            }
        } else {
            warn!("dropping conflicting Content-Length headers");
            response.headers_mut().remove(CONTENT_LENGTH);
        }
    }
}

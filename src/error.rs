use http::StatusCode;
use thiserror::Error;

/// Boxed error type used at the adapter seams ([`Backend`](crate::Backend),
/// [`CacheStore`](crate::CacheStore), [`ResourceFactory`](crate::ResourceFactory)).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A `Result` typedef to use with the [`CacheError`] type
pub type Result<T> = std::result::Result<T, CacheError>;

/// The error taxonomy surfaced by the caching layer.
///
/// Storage failures never reach the caller through this type; they are logged
/// and the request falls back to the backend or to a stale entry.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend transport failed while dispatching a request
    #[error("backend transport failed: {0}")]
    Transport(#[source] BoxError),
    /// A cache store operation failed
    #[error("cache storage failed: {0}")]
    Storage(#[source] BoxError),
    /// The backend produced a message that cannot be made protocol compliant
    #[error("protocol violation in backend response: {0}")]
    Protocol(String),
    /// Error from http
    #[error(transparent)]
    Http(#[from] http::Error),
    /// There was an error converting a header value to a string
    #[error(transparent)]
    HeaderToStr(#[from] http::header::ToStrError),
    /// There was an error parsing an HTTP header value
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
}

/// Rejection raised by a [`ResourceFactory`](crate::ResourceFactory) when a
/// response body may not be allocated. Treated as "not cacheable": the
/// response passes through uncached.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("response body of {size} bytes exceeds the {max_object_size} byte object limit")]
pub struct AllocationRejected {
    /// Size of the rejected body in bytes
    pub size: usize,
    /// The configured ceiling the body ran into
    pub max_object_size: usize,
}

/// Fatal request noncompliance detected before dispatch.
///
/// These do not surface as [`CacheError`]; each maps to a synthesized error
/// response tagged [`CacheResponseStatus::CacheModuleResponse`](crate::CacheResponseStatus).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestProtocolError {
    /// The request method is not part of the HTTP/1.1 method set
    #[error("request method is not recognized")]
    UnknownMethod,
    /// An `If-Range` precondition carries a weak entity tag
    #[error("If-Range header carries a weak entity tag")]
    WeakEtagOnRange,
    /// The request carries an `Expect` directive other than `100-continue`
    #[error("Expect directive is not supported")]
    InvalidExpectDirective,
    /// The request protocol version is above what this cache speaks
    #[error("HTTP protocol version is not supported")]
    UnsupportedHttpVersion,
}

impl RequestProtocolError {
    /// The status code of the response synthesized for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownMethod => StatusCode::NOT_IMPLEMENTED,
            Self::WeakEtagOnRange => StatusCode::BAD_REQUEST,
            Self::InvalidExpectDirective => StatusCode::EXPECTATION_FAILED,
            Self::UnsupportedHttpVersion => {
                StatusCode::HTTP_VERSION_NOT_SUPPORTED
            }
        }
    }
}

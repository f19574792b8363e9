//! Error taxonomy for the catalog client.
//!
//! # Design
//! Every failure is one `ApiError` value carrying a machine-readable
//! [`ErrorKind`] and a human-readable message. Each HTTP status family that
//! callers branch on gets its own kind instead of a raw code; the original
//! status still travels on the error as `http_status`.
//!
//! Caller-initiated cancellation is not part of the taxonomy. It is reported
//! through [`Cancelled`], outside of `ApiResult`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // General
    Unknown,

    // Transport
    ConnectionFailed,
    /// Deadline expiry, whether it came from the transport or from a retry
    /// policy layered underneath it.
    Timeout,

    // HTTP status families
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Conflict,
    TooManyRequests,
    UnavailableForLegalReasons,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    HttpVersionNotSupported,
    LoopDetected,

    // Validation
    InvalidUrl,
    MissingParameter,
    InvalidArgument,
    OutOfRange,

    // Serialization and content
    DeserializationFailed,
    SerializationFailed,
    EmptyResponse,
    UnexpectedContentType,
    /// An edge/CDN interstitial served in place of the API response.
    CloudflareError,

    // Resource state
    NotReady,
}

/// Status codes with a dedicated kind. Anything else that is an error status
/// classifies as [`ErrorKind::Unknown`].
const STATUS_KINDS: &[(u16, ErrorKind)] = &[
    (400, ErrorKind::BadRequest),
    (401, ErrorKind::Unauthorized),
    (402, ErrorKind::PaymentRequired),
    (403, ErrorKind::Forbidden),
    (404, ErrorKind::NotFound),
    (405, ErrorKind::MethodNotAllowed),
    (406, ErrorKind::NotAcceptable),
    (409, ErrorKind::Conflict),
    (429, ErrorKind::TooManyRequests),
    (451, ErrorKind::UnavailableForLegalReasons),
    (500, ErrorKind::InternalServerError),
    (501, ErrorKind::NotImplemented),
    (502, ErrorKind::BadGateway),
    (503, ErrorKind::ServiceUnavailable),
    (504, ErrorKind::GatewayTimeout),
    (505, ErrorKind::HttpVersionNotSupported),
    (508, ErrorKind::LoopDetected),
];

impl ErrorKind {
    /// Kind for an error status. Non-error statuses return `None`.
    pub fn from_status(status: u16) -> Option<ErrorKind> {
        if status < 400 {
            return None;
        }
        let kind = STATUS_KINDS
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::Unknown);
        Some(kind)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unknown => "unknown",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::PaymentRequired => "payment_required",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::NotAcceptable => "not_acceptable",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::UnavailableForLegalReasons => "unavailable_for_legal_reasons",
            ErrorKind::InternalServerError => "internal_server_error",
            ErrorKind::NotImplemented => "not_implemented",
            ErrorKind::BadGateway => "bad_gateway",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::GatewayTimeout => "gateway_timeout",
            ErrorKind::HttpVersionNotSupported => "http_version_not_supported",
            ErrorKind::LoopDetected => "loop_detected",
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::MissingParameter => "missing_parameter",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::DeserializationFailed => "deserialization_failed",
            ErrorKind::SerializationFailed => "serialization_failed",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::UnexpectedContentType => "unexpected_content_type",
            ErrorKind::CloudflareError => "cloudflare_error",
            ErrorKind::NotReady => "not_ready",
        }
    }

    /// True for kinds raised by builder validation before any I/O.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidUrl
                | ErrorKind::MissingParameter
                | ErrorKind::InvalidArgument
                | ErrorKind::OutOfRange
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation messages keyed by field name.
pub type ErrorDetails = BTreeMap<String, Vec<String>>;

type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// A classified failure. Built once at the failure site and never mutated
/// afterwards; the `with_*` methods consume and return the value.
#[derive(Clone)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    details: Option<ErrorDetails>,
    cause: Option<Cause>,
    http_status: Option<u16>,
    retry_after: Option<Duration>,
    trace_id: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            cause: None,
            http_status: None,
            retry_after: None,
            trace_id: None,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfRange, message)
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        self.details.as_ref()
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Server-requested delay before retrying, from `Retry-After`.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }
}

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("details", &self.details)
            .field("cause", &self.cause.as_ref().map(|cause| cause.to_string()))
            .field("http_status", &self.http_status)
            .field("retry_after", &self.retry_after)
            .field("trace_id", &self.trace_id)
            .finish()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} (HTTP {status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

/// The cause is compared by presence only; two errors classified from the
/// same input are equal even though their causes are distinct allocations.
impl PartialEq for ApiError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.message == other.message
            && self.details == other.details
            && self.cause.is_some() == other.cause.is_some()
            && self.http_status == other.http_status
            && self.retry_after == other.retry_after
            && self.trace_id == other.trace_id
    }
}

/// The caller aborted the request before the transport completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cancelled by caller")]
pub struct Cancelled;

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

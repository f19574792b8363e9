//! Turns transport outcomes into `ApiResult`s.
//!
//! # Design
//! Classification of a received response runs in a fixed order:
//!
//! 1. Content type. A non-JSON body is a failure even on a 2xx status. The
//!    body is first scanned for edge/CDN interstitial signatures, then falls
//!    back to [`ErrorKind::UnexpectedContentType`].
//! 2. Status. Error statuses map through the fixed status table; `Retry-After`
//!    is lifted onto the error.
//! 3. Body. 2xx JSON is deserialized; `null` or an empty body is
//!    [`ErrorKind::EmptyResponse`].
//!
//! Checking status first would let a 200 challenge page deserialize as data,
//! so step 1 must stay first. The classifier only borrows the response:
//! classifying the same response twice gives equal results.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{parse_retry_after, ApiError, ErrorDetails, ErrorKind};
use crate::http::HttpResponse;
use crate::pagination::{Envelope, PagedResult, PaginationMetadata};
use crate::result::ApiResult;
use crate::transport::TransportError;

/// Continuation cursor for entities that page without body metadata.
pub const NEXT_CURSOR_HEADER: &str = "x-next-cursor";

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Literal markers of edge/CDN block and challenge pages. Best effort: a page
/// matching none of these still fails as an unexpected content type.
pub const INTERSTITIAL_SIGNATURES: &[&str] = &[
    "cf-browser-verification",
    "cf-challenge",
    "cf_chl_",
    "/cdn-cgi/challenge-platform",
    "cf-error-details",
    "Attention Required! | Cloudflare",
    "Just a moment...",
    "Checking your browser before accessing",
    "DDoS protection by Cloudflare",
];

/// Map a failure that occurred before any response arrived.
///
/// Retry-policy timeouts are indistinguishable from transport timeouts. A
/// body that is not UTF-8 cannot be deserialized and keeps its status.
pub fn classify_transport_error(err: TransportError) -> ApiError {
    let kind = match &err {
        TransportError::Timeout | TransportError::PolicyTimeout(_) => {
            return ApiError::new(ErrorKind::Timeout, "request timed out");
        }
        TransportError::InvalidBody { status, .. } => {
            let status = *status;
            return ApiError::new(ErrorKind::DeserializationFailed, err.to_string())
                .with_http_status(status)
                .with_cause(err);
        }
        TransportError::Connect(_) => ErrorKind::ConnectionFailed,
        TransportError::InvalidRequest(_) => ErrorKind::InvalidUrl,
        TransportError::Other(_) => ErrorKind::Unknown,
    };
    ApiError::new(kind, err.to_string()).with_cause(err)
}

/// Classify a single-entity response.
pub fn classify_entity<T: DeserializeOwned>(response: &HttpResponse) -> ApiResult<T> {
    if let Some(err) = check_response(response) {
        return ApiResult::Failure(err);
    }
    deserialize(response)
}

/// Classify a response whose body, if any, is ignored. An empty 2xx is a
/// success here.
pub fn classify_no_content(response: &HttpResponse) -> ApiResult<()> {
    if response.is_success() && response.body.trim().is_empty() {
        return ApiResult::Success(());
    }
    match check_response(response) {
        Some(err) => ApiResult::Failure(err),
        None => ApiResult::Success(()),
    }
}

/// Classify a list response and reconcile its pagination metadata with the
/// `X-Next-Cursor` header.
pub fn classify_page<T: DeserializeOwned>(response: &HttpResponse) -> ApiResult<PagedResult<T>> {
    classify_entity::<Envelope<T>>(response).map(|envelope| PagedResult {
        items: envelope.items,
        metadata: reconcile_metadata(envelope.metadata, response.header(NEXT_CURSOR_HEADER)),
    })
}

/// Body metadata, when present, is used as sent and the header is ignored.
/// Without it, a header cursor becomes cursor-only metadata.
pub fn reconcile_metadata(
    body: Option<PaginationMetadata>,
    header_cursor: Option<&str>,
) -> Option<PaginationMetadata> {
    match body {
        Some(meta) => Some(meta),
        None => header_cursor
            .map(str::trim)
            .filter(|cursor| !cursor.is_empty())
            .map(PaginationMetadata::from_cursor),
    }
}

/// True when the response looks like an interstitial rather than the API.
pub fn is_interstitial(response: &HttpResponse) -> bool {
    if response
        .header("cf-mitigated")
        .is_some_and(|value| value.eq_ignore_ascii_case("challenge"))
    {
        return true;
    }
    INTERSTITIAL_SIGNATURES
        .iter()
        .any(|signature| response.body.contains(signature))
}

/// Steps 1 and 2, plus the empty-body cases of step 3.
fn check_response(response: &HttpResponse) -> Option<ApiError> {
    let status = response.status;
    let body_empty = response.body.trim().is_empty();
    let untyped_empty = body_empty && response.media_type().is_none();

    if !response.is_json() && !untyped_empty {
        let media = response.media_type().unwrap_or_else(|| "none".to_string());
        let err = if is_interstitial(response) {
            warn!(status, media = %media, "edge interstitial returned instead of API response");
            ApiError::new(
                ErrorKind::CloudflareError,
                "response was an edge/CDN challenge or block page",
            )
        } else {
            warn!(status, media = %media, "non-JSON response");
            ApiError::new(
                ErrorKind::UnexpectedContentType,
                format!("expected JSON, got content type {media}"),
            )
        };
        return Some(attach_trace(err.with_http_status(status), response));
    }

    if !response.is_success() {
        let kind = ErrorKind::from_status(status).unwrap_or(ErrorKind::Unknown);
        debug!(status, %kind, "error status");
        let mut err = error_from_body(kind, response).with_http_status(status);
        if let Some(retry_after) = response.header("retry-after").and_then(parse_retry_after) {
            err = err.with_retry_after(retry_after);
        }
        return Some(attach_trace(err, response));
    }

    if body_empty {
        let err = if status == 202 {
            ApiError::new(ErrorKind::NotReady, "resource accepted but not ready yet")
        } else {
            ApiError::new(ErrorKind::EmptyResponse, "response body was empty")
        };
        return Some(attach_trace(err.with_http_status(status), response));
    }

    None
}

fn deserialize<T: DeserializeOwned>(response: &HttpResponse) -> ApiResult<T> {
    match serde_json::from_str::<Option<T>>(&response.body) {
        Ok(Some(value)) => ApiResult::Success(value),
        Ok(None) => ApiResult::Failure(attach_trace(
            ApiError::new(ErrorKind::EmptyResponse, "response body was null")
                .with_http_status(response.status),
            response,
        )),
        Err(e) => ApiResult::Failure(attach_trace(
            ApiError::new(ErrorKind::DeserializationFailed, e.to_string())
                .with_http_status(response.status)
                .with_cause(e),
            response,
        )),
    }
}

/// Build an error from a JSON error body, when there is one.
fn error_from_body(kind: ErrorKind, response: &HttpResponse) -> ApiError {
    let fallback = format!("server responded with HTTP {}", response.status);
    let Ok(body) = serde_json::from_str::<Value>(&response.body) else {
        return ApiError::new(kind, fallback);
    };

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .or_else(|| body.pointer("/error/message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or(fallback);
    let mut err = ApiError::new(kind, message);

    if let Some(details) = body.get("errors").and_then(parse_details) {
        err = err.with_details(details);
    }
    if let Some(trace_id) = body.get("traceId").and_then(Value::as_str) {
        err = err.with_trace_id(trace_id);
    }
    err
}

/// `{"field": ["msg", ...]}`; a bare string counts as one message.
fn parse_details(errors: &Value) -> Option<ErrorDetails> {
    let object = errors.as_object()?;
    let details: ErrorDetails = object
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                other => vec![other.to_string()],
            };
            (field.clone(), messages)
        })
        .collect();
    if details.is_empty() {
        None
    } else {
        Some(details)
    }
}

fn attach_trace(err: ApiError, response: &HttpResponse) -> ApiError {
    match response.header(TRACE_ID_HEADER) {
        Some(trace_id) => err.with_trace_id(trace_id),
        None => err,
    }
}

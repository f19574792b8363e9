//! Executes one request over a [`Transport`] and classifies transport
//! failures.
//!
//! A call moves `Idle -> Sent -> {Completed | TransportFailed | Cancelled}`.
//! `Completed` yields the raw response for the classifier; `TransportFailed`
//! is already an `ApiError`; `Cancelled` only happens on the cancellable path
//! and is returned as [`Cancelled`], never as an `ApiError`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

use crate::classify::classify_transport_error;
use crate::error::{ApiError, Cancelled};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

#[derive(Clone)]
pub struct TransportExecutor {
    transport: Arc<dyn Transport>,
}

impl TransportExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let span = debug_span!("http_request", method = request.method.as_str(), url = %request.url);
        async move {
            match self.transport.send(request).await {
                Ok(response) => {
                    debug!(status = response.status, "request completed");
                    Ok(response)
                }
                Err(err) => {
                    debug!(error = %err, "transport failed");
                    Err(classify_transport_error(err))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Like [`send`](Self::send), but gives up with `Err(Cancelled)` if
    /// `cancel` fires before the transport completes.
    pub async fn send_cancellable(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<Result<HttpResponse, ApiError>, Cancelled> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("request cancelled by caller");
                Err(Cancelled)
            }
            outcome = self.send(request) => Ok(outcome),
        }
    }
}

impl std::fmt::Debug for TransportExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ErrorKind;
    use crate::http::HttpMethod;
    use crate::transport::TransportError;

    struct Delayed {
        delay: Duration,
        outcome: fn() -> Result<HttpResponse, TransportError>,
    }

    #[async_trait]
    impl Transport for Delayed {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            tokio::time::sleep(self.delay).await;
            (self.outcome)()
        }
    }

    fn ok() -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "{}".to_string(),
        })
    }

    fn timeout() -> Result<HttpResponse, TransportError> {
        Err(TransportError::Timeout)
    }

    fn executor(delay_ms: u64, outcome: fn() -> Result<HttpResponse, TransportError>) -> TransportExecutor {
        TransportExecutor::new(Arc::new(Delayed {
            delay: Duration::from_millis(delay_ms),
            outcome,
        }))
    }

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/v1/models".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn completed_call_returns_response() {
        let response = executor(0, ok).send(request()).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn transport_timeout_becomes_failure() {
        let err = executor(0, timeout).send(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn cancellation_mid_flight_is_not_a_failure() {
        let exec = executor(5_000, ok);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let outcome = exec.send_cancellable(request(), &token).await;
        assert_eq!(outcome.unwrap_err(), Cancelled);
    }

    #[tokio::test]
    async fn cancellation_after_completion_has_no_effect() {
        let exec = executor(0, ok);
        let token = CancellationToken::new();
        let outcome = exec.send_cancellable(request(), &token).await;
        token.cancel();
        assert_eq!(outcome.unwrap().unwrap().status, 200);
    }

    #[tokio::test]
    async fn timeout_on_cancellable_path_is_still_a_failure() {
        let token = CancellationToken::new();
        let outcome = executor(0, timeout).send_cancellable(request(), &token).await;
        assert_eq!(outcome.unwrap().unwrap_err().kind(), ErrorKind::Timeout);
    }
}

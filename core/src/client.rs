//! Shared client handle.
//!
//! # Design
//! `Client` is an `Arc` around the configuration and the transport executor,
//! so cloning it is cheap and every builder carries its own handle. The
//! transport's connection pool is the only shared mutable resource and lives
//! behind the [`Transport`] trait.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::builder::{Entity, RequestBuilder};
use crate::classify::{classify_entity, classify_no_content, classify_transport_error};
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorKind};
use crate::executor::TransportExecutor;
use crate::http::{HttpMethod, HttpRequest};
use crate::result::ApiResult;
use crate::transport::{ReqwestTransport, RetryingTransport, Transport};

#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    executor: TransportExecutor,
}

impl Client {
    /// Client over a `reqwest` transport, wrapped in a retry layer when the
    /// configuration carries a [`RetryPolicy`](crate::transport::RetryPolicy).
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeout).map_err(classify_transport_error)?;
        let transport: Arc<dyn Transport> = match config.retry.clone() {
            Some(policy) => Arc::new(RetryingTransport::new(transport, policy)),
            None => Arc::new(transport),
        };
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                executor: TransportExecutor::new(transport),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn executor(&self) -> &TransportExecutor {
        &self.inner.executor
    }

    /// Empty builder for `E`'s list endpoint.
    pub fn query<E: Entity>(&self) -> RequestBuilder<E> {
        RequestBuilder::new(self.clone())
    }

    /// Attach the standard headers to a request for `url`.
    pub fn request(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        let config = &self.inner.config;
        let mut headers = vec![
            ("accept".to_string(), "application/json".to_string()),
            ("user-agent".to_string(), config.user_agent.clone()),
        ];
        if let Some(key) = &config.api_key {
            headers.push(("authorization".to_string(), format!("Bearer {key}")));
        }
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }

    /// Fetch one `E` by numeric id. Ids below 1 fail without a request.
    pub async fn get_by_id<E: Entity>(&self, id: i64) -> ApiResult<E> {
        if id < 1 {
            return ApiResult::Failure(ApiError::invalid_argument(format!(
                "{} id must be positive, got {id}",
                E::RESOURCE
            )));
        }
        let url = self.inner.config.endpoint(&format!("{}/{id}", E::RESOURCE));
        let request = self.request(HttpMethod::Get, url, None);
        match self.executor().send(request).await {
            Ok(response) => classify_entity(&response),
            Err(err) => ApiResult::Failure(err),
        }
    }

    /// Call `path` with an optional JSON body and decode a JSON response.
    pub async fn send_json<B, T>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = match self.prepare(method, path, body) {
            Ok(request) => request,
            Err(err) => return ApiResult::Failure(err),
        };
        match self.executor().send(request).await {
            Ok(response) => classify_entity(&response),
            Err(err) => ApiResult::Failure(err),
        }
    }

    /// `DELETE path`, accepting an empty success response.
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        let request = match self.prepare::<()>(HttpMethod::Delete, path, None) {
            Ok(request) => request,
            Err(err) => return ApiResult::Failure(err),
        };
        match self.executor().send(request).await {
            Ok(response) => classify_no_content(&response),
            Err(err) => ApiResult::Failure(err),
        }
    }

    fn prepare<B>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(ApiError::new(ErrorKind::MissingParameter, "request path is empty"));
        }
        if method == HttpMethod::Get && body.is_some() {
            return Err(ApiError::invalid_argument("GET requests cannot carry a body"));
        }
        let body = body
            .map(|body| {
                serde_json::to_string(body).map_err(|e| {
                    ApiError::new(ErrorKind::SerializationFailed, e.to_string()).with_cause(e)
                })
            })
            .transpose()?;
        let url = self.inner.config.endpoint(path);
        debug!(method = method.as_str(), url = %url, "prepared request");
        Ok(self.request(method, url, body))
    }
}

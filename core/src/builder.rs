//! Fluent, immutable request builder.
//!
//! # Design
//! `RequestBuilder<E>` pairs a [`Client`] handle with an `Arc<QueryState>`.
//! Every fluent method borrows the receiver and returns a new builder holding
//! a new state, so one base builder can be stored and reused from any number
//! of tasks. Validation that depends on the entity (page size bounds, which
//! pagination mode is legal) happens in the fluent call itself and never
//! reaches the network.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classify::classify_page;
use crate::client::Client;
use crate::error::{ApiError, Cancelled};
use crate::http::{HttpMethod, HttpRequest};
use crate::pagination::{PagedResult, PaginationMetadata};
use crate::query::{FilterValue, PagePosition, QueryState};
use crate::result::ApiResult;

/// How an entity's list endpoint continues to the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Opaque continuation token, sent as `cursor`.
    Cursor,
    /// 1-based page number, sent as `page`.
    PageIndex,
}

/// A resource type returned by a list endpoint.
pub trait Entity: DeserializeOwned + Send + 'static {
    /// Path segment under the versioned base URL, e.g. `"models"`.
    const RESOURCE: &'static str;
    const PAGINATION: PaginationMode = PaginationMode::Cursor;
    const SUPPORTS_SORT: bool = false;
    const MIN_PAGE_SIZE: u32 = 1;
    const MAX_PAGE_SIZE: u32 = 100;
}

pub struct RequestBuilder<E> {
    client: Client,
    state: Arc<QueryState>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RequestBuilder<E> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(QueryState::new()),
            _entity: PhantomData,
        }
    }

    fn with_state(&self, state: QueryState) -> Self {
        Self {
            client: self.client.clone(),
            state: Arc::new(state),
            _entity: PhantomData,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    #[must_use]
    pub fn with_filter(&self, key: &str, value: impl Into<FilterValue>) -> Self {
        self.with_state(self.state.with_filter(key, value.into()))
    }

    /// `None` removes any previous value for `key`.
    #[must_use]
    pub fn with_optional_filter<V: Into<FilterValue>>(&self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_filter(key, value),
            None => self.with_state(self.state.without_filter(key)),
        }
    }

    #[must_use]
    pub fn with_sort(&self, sort: &str) -> Self {
        self.with_state(self.state.with_sort(sort))
    }

    pub fn with_page_size(&self, page_size: u32) -> Result<Self, ApiError> {
        if !(E::MIN_PAGE_SIZE..=E::MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ApiError::out_of_range(format!(
                "page size {page_size} is outside {}..={} for {}",
                E::MIN_PAGE_SIZE,
                E::MAX_PAGE_SIZE,
                E::RESOURCE
            )));
        }
        Ok(self.with_state(self.state.with_page_size(page_size)))
    }

    pub fn with_cursor(&self, cursor: &str) -> Result<Self, ApiError> {
        if E::PAGINATION != PaginationMode::Cursor {
            return Err(ApiError::invalid_argument(format!(
                "{} pages by index, not by cursor",
                E::RESOURCE
            )));
        }
        if cursor.trim().is_empty() {
            return Err(ApiError::invalid_argument("cursor must not be empty"));
        }
        Ok(self.with_state(self.state.with_position(PagePosition::Cursor(cursor.to_string()))))
    }

    pub fn with_page_index(&self, page: u32) -> Result<Self, ApiError> {
        if E::PAGINATION != PaginationMode::PageIndex {
            return Err(ApiError::invalid_argument(format!(
                "{} pages by cursor, not by index",
                E::RESOURCE
            )));
        }
        if page == 0 {
            return Err(ApiError::out_of_range("page index is 1-based"));
        }
        Ok(self.with_state(self.state.with_position(PagePosition::Page(page))))
    }

    /// Builder positioned at the page after the one `metadata` describes,
    /// or `None` when the server reports no further page.
    pub fn next_page(&self, metadata: &PaginationMetadata) -> Option<Self> {
        match E::PAGINATION {
            PaginationMode::Cursor => metadata
                .next_cursor
                .as_deref()
                .and_then(|cursor| self.with_cursor(cursor).ok()),
            PaginationMode::PageIndex => metadata
                .next_page()
                .and_then(|page| self.with_page_index(page).ok()),
        }
    }

    pub fn query_string(&self) -> String {
        self.state.render(E::SUPPORTS_SORT)
    }

    pub fn build_request(&self) -> HttpRequest {
        let url = format!("{}{}", self.client.config().endpoint(E::RESOURCE), self.query_string());
        self.client.request(HttpMethod::Get, url, None)
    }

    /// Fetch one page. `page_size` and `cursor` override the builder's own
    /// values for this call and are validated the same way.
    pub async fn execute(&self, page_size: Option<u32>, cursor: Option<&str>) -> ApiResult<PagedResult<E>> {
        let request = match self.prepare(page_size, cursor) {
            Ok(request) => request,
            Err(err) => return ApiResult::Failure(err),
        };
        match self.client.executor().send(request).await {
            Ok(response) => classify_page(&response),
            Err(err) => ApiResult::Failure(err),
        }
    }

    /// [`execute`](Self::execute) with caller cancellation. Cancelling before
    /// the response arrives returns `Err(Cancelled)`.
    pub async fn execute_cancellable(
        &self,
        page_size: Option<u32>,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ApiResult<PagedResult<E>>, Cancelled> {
        let request = match self.prepare(page_size, cursor) {
            Ok(request) => request,
            Err(err) => return Ok(ApiResult::Failure(err)),
        };
        let outcome = self.client.executor().send_cancellable(request, cancel).await?;
        Ok(match outcome {
            Ok(response) => classify_page(&response),
            Err(err) => ApiResult::Failure(err),
        })
    }

    /// First match, or `Success(None)` when the query matches nothing.
    pub async fn first_or_default(&self) -> ApiResult<Option<E>> {
        self.execute(Some(E::MIN_PAGE_SIZE.max(1)), None)
            .await
            .map(|page| page.items.into_iter().next())
    }

    fn prepare(&self, page_size: Option<u32>, cursor: Option<&str>) -> Result<HttpRequest, ApiError> {
        let mut builder = self.clone();
        if let Some(page_size) = page_size {
            builder = builder.with_page_size(page_size)?;
        }
        if let Some(cursor) = cursor {
            builder = builder.with_cursor(cursor)?;
        }
        let request = builder.build_request();
        debug!(resource = E::RESOURCE, url = %request.url, "prepared list request");
        Ok(request)
    }
}

impl<E> Clone for RequestBuilder<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            state: Arc::clone(&self.state),
            _entity: PhantomData,
        }
    }
}

/// Builders are equal when their query states are.
impl<E> PartialEq for RequestBuilder<E> {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl<E> fmt::Debug for RequestBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("entity", &std::any::type_name::<E>())
            .field("state", &self.state)
            .finish()
    }
}

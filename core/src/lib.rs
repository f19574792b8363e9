//! Typed client core for a paginated, filterable JSON API.
//!
//! # Overview
//! A caller starts from [`Client::query`], refines the returned
//! [`RequestBuilder`] with `with_*` calls, and runs it with
//! [`RequestBuilder::execute`]. Every failure from the network boundary
//! onwards comes back as an [`ApiResult::Failure`] carrying an [`ApiError`];
//! only caller cancellation is reported separately, as [`Cancelled`].
//!
//! # Design
//! - Builders and query states are immutable values; a base builder can be
//!   shared across tasks and reused without locking.
//! - The request pipeline is split at the I/O boundary: `build_request`
//!   produces a plain [`HttpRequest`], a [`Transport`] returns a plain
//!   [`HttpResponse`], and the [`classify`] functions turn that into a result.
//! - The classifier checks content type before status so that an edge
//!   challenge page served with `200 OK` is never mistaken for data.
//! - List responses carry either body pagination metadata or an
//!   `X-Next-Cursor` header. Both end up as one [`PaginationMetadata`] (body
//!   first, header only when the body has none), so callers page the same
//!   way for every entity.

pub mod builder;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod pagination;
pub mod query;
pub mod result;
pub mod transport;

pub use builder::{Entity, PaginationMode, RequestBuilder};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{ApiError, Cancelled, ErrorDetails, ErrorKind};
pub use executor::TransportExecutor;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use pagination::{PagedResult, PaginationMetadata};
pub use query::{FilterValue, PagePosition, QueryState, WireEnum};
pub use result::ApiResult;
pub use transport::{ReqwestTransport, RetryPolicy, RetryingTransport, Transport, TransportError};

pub use tokio_util::sync::CancellationToken;

//! HTTP client facade for the back-office API.
//!
//! - `client` - [`ApiClient`], dispatch and JSON helpers
//! - `endpoint` - primary/fallback base URLs and the active one
//! - `error` - [`ApiError`] classification
//! - `failover` - fallback retry, multi-endpoint helper, health probes
//! - `pipeline` - request/response interceptors
//! - `request`, `response` - descriptors

mod client;
mod endpoint;
mod error;
mod failover;
mod pipeline;
mod request;
mod response;

pub use client::{ApiClient, DEFAULT_TIMEOUT, HEALTH_PATH};
pub use endpoint::{Endpoints, join_url};
pub use error::{ApiError, ErrorKind, classify_status, is_success};
pub use failover::Connectivity;
pub use pipeline::{
    AuthGuard, BearerToken, Outcome, Pipeline, RequestInterceptor, ResponseInterceptor,
};
pub use request::{ApiRequest, Attempt, RequestOptions};
pub use response::ApiResponse;

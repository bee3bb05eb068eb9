//! API client facade: dispatch, interceptors and JSON helpers.

use log::debug;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::endpoint::{Endpoints, join_url};
use super::error::{ApiError, ErrorKind, is_success};
use super::pipeline::{Outcome, Pipeline};
use super::request::{ApiRequest, Attempt, RequestOptions};
use super::response::ApiResponse;
use crate::session::{AuthEvents, TokenStore};

/// Timeout applied to every request that does not set its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Path probed by [`ApiClient::test_connectivity`].
pub const HEALTH_PATH: &str = "health";

/// HTTP client for the back-office API with fallback endpoints.
///
/// Clones share the endpoint set, so a failover observed through one clone
/// is visible to all of them. Separately constructed clients share nothing.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    endpoints: Arc<Endpoints>,
    pipeline: Pipeline,
    timeout: Duration,
    health_path: String,
}

impl ApiClient {
    pub fn new(http: Client, endpoints: Endpoints, pipeline: Pipeline) -> Self {
        Self {
            http,
            endpoints: Arc::new(endpoints),
            pipeline,
            timeout: DEFAULT_TIMEOUT,
            health_path: HEALTH_PATH.to_string(),
        }
    }

    /// A client with the standard pipeline over the given token store.
    pub fn with_session(
        http: Client,
        endpoints: Endpoints,
        store: Arc<dyn TokenStore>,
        events: AuthEvents,
    ) -> Self {
        Self::new(http, endpoints, Pipeline::standard(store, events))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn active_endpoint(&self) -> String {
        self.endpoints.active()
    }

    pub fn set_active_endpoint(&self, endpoint: &str) {
        self.endpoints.set_active_endpoint(endpoint)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn health_path(&self) -> &str {
        &self.health_path
    }

    /// Issues `method path` against the active endpoint.
    #[tracing::instrument(skip(self, body, options))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let mut request = ApiRequest::new(method, path).with_options(options);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::post(path).with_body(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::put(path).with_body(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::delete(path)).await
    }

    /// GET and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get(path).await?.json()
    }

    /// POST a serializable body and decode the JSON reply.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(path, to_body(body)?).await?.json()
    }

    /// PUT a serializable body and decode the JSON reply.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.put(path, to_body(body)?).await?.json()
    }

    /// Sends a request that has not failed over yet.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.send_attempt(request, Attempt::First).await
    }

    /// Sends a request against the active endpoint. A network failure starts
    /// the fallback scan only when `attempt` still allows it.
    #[tracing::instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn send_attempt(
        &self,
        request: ApiRequest,
        attempt: Attempt,
    ) -> Result<ApiResponse, ApiError> {
        let base_url = self.endpoints.active();

        match self.exchange(&request, &base_url).await {
            Err(error) if error.kind() == ErrorKind::Network => {
                self.retry_with_fallback(&request, attempt, &base_url, error)
                    .await
            }
            outcome => outcome,
        }
    }

    /// One pass through the pipeline against one base URL, no failover.
    pub(crate) async fn exchange(&self, request: &ApiRequest, base_url: &str) -> Outcome {
        let prepared = self.pipeline.prepare(request.clone())?;
        let outcome = self.dispatch(&prepared, base_url).await;
        self.pipeline.complete(outcome)
    }

    /// Like [`exchange`](Self::exchange) without the response stages, so the
    /// outcome never touches the stored session.
    pub(crate) async fn exchange_unguarded(&self, request: &ApiRequest, base_url: &str) -> Outcome {
        let prepared = self.pipeline.prepare(request.clone())?;
        self.dispatch(&prepared, base_url).await
    }

    async fn dispatch(&self, request: &ApiRequest, base_url: &str) -> Outcome {
        let url = join_url(base_url, request.path());
        debug!("{} {}", request.method(), url);

        let mut builder = self
            .http
            .request(request.method().clone(), &url)
            .timeout(request.timeout().unwrap_or(self.timeout));
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e, base_url))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e, base_url))?;

        let response = ApiResponse::new(status, headers, body.to_vec(), base_url);
        if is_success(status) {
            Ok(response)
        } else {
            debug!("{} {} -> HTTP {}", request.method(), url, status);
            Err(ApiError::from_response(&response))
        }
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| {
        ApiError::new(
            ErrorKind::InvalidRequest,
            format!("Failed to serialize request body: {}", e),
        )
    })
}

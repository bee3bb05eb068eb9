//! Request and response interceptors.
//!
//! A [`Pipeline`] is two ordered lists of stages. Request stages run on every
//! outgoing request before dispatch; response stages run on every classified
//! outcome afterwards. Stages are plain values, so each one can be tested on
//! its own.

use log::{debug, warn};
use std::sync::Arc;

use super::error::{ApiError, ErrorKind};
use super::request::ApiRequest;
use super::response::ApiResponse;
use crate::session::{AuthEvents, TOKEN_KEY, TokenStore};

pub type Outcome = Result<ApiResponse, ApiError>;

/// A pre-dispatch stage. Returning an error aborts the request.
pub trait RequestInterceptor: Send + Sync {
    fn on_request(&self, request: ApiRequest) -> Result<ApiRequest, ApiError>;
}

/// A post-dispatch stage.
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(&self, outcome: Outcome) -> Outcome;
}

impl<F> RequestInterceptor for F
where
    F: Fn(ApiRequest) -> Result<ApiRequest, ApiError> + Send + Sync,
{
    fn on_request(&self, request: ApiRequest) -> Result<ApiRequest, ApiError> {
        self(request)
    }
}

impl<F> ResponseInterceptor for F
where
    F: Fn(Outcome) -> Outcome + Send + Sync,
{
    fn on_response(&self, outcome: Outcome) -> Outcome {
        self(outcome)
    }
}

#[derive(Clone, Default)]
pub struct Pipeline {
    request_stages: Vec<Arc<dyn RequestInterceptor>>,
    response_stages: Vec<Arc<dyn ResponseInterceptor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer token injection on the way out, auth-failure handling on the
    /// way back.
    pub fn standard(store: Arc<dyn TokenStore>, events: AuthEvents) -> Self {
        Self::new()
            .with_request_stage(BearerToken::new(store.clone()))
            .with_response_stage(AuthGuard::new(store, events))
    }

    pub fn with_request_stage(mut self, stage: impl RequestInterceptor + 'static) -> Self {
        self.request_stages.push(Arc::new(stage));
        self
    }

    pub fn with_response_stage(mut self, stage: impl ResponseInterceptor + 'static) -> Self {
        self.response_stages.push(Arc::new(stage));
        self
    }

    pub fn prepare(&self, request: ApiRequest) -> Result<ApiRequest, ApiError> {
        self.request_stages
            .iter()
            .try_fold(request, |request, stage| stage.on_request(request))
    }

    pub fn complete(&self, outcome: Outcome) -> Outcome {
        self.response_stages
            .iter()
            .fold(outcome, |outcome, stage| stage.on_response(outcome))
    }
}

/// Adds `Authorization: Bearer <token>` when a token is stored.
pub struct BearerToken {
    store: Arc<dyn TokenStore>,
}

impl BearerToken {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

impl RequestInterceptor for BearerToken {
    fn on_request(&self, request: ApiRequest) -> Result<ApiRequest, ApiError> {
        let token = self.store.get(TOKEN_KEY).map_err(|e| {
            ApiError::new(
                ErrorKind::InvalidRequest,
                format!("Failed to read stored token: {:#}", e),
            )
        })?;

        match token {
            Some(token) if !token.is_empty() => {
                Ok(request.with_header("authorization", format!("Bearer {}", token)))
            }
            _ => Ok(request),
        }
    }
}

/// On 401: drops the stored token and emits auth-expired. 403 only keeps its
/// auth flag; the token is still valid, just not sufficient.
pub struct AuthGuard {
    store: Arc<dyn TokenStore>,
    events: AuthEvents,
}

impl AuthGuard {
    pub fn new(store: Arc<dyn TokenStore>, events: AuthEvents) -> Self {
        Self { store, events }
    }
}

impl ResponseInterceptor for AuthGuard {
    fn on_response(&self, outcome: Outcome) -> Outcome {
        if let Err(error) = &outcome {
            if error.status() == Some(401) {
                debug!("Server rejected credentials, clearing stored token");
                if let Err(e) = self.store.remove(TOKEN_KEY) {
                    warn!("Failed to clear stored token: {:#}", e);
                }
                self.events.emit_auth_expired();
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;
    use reqwest::header::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failure(status: u16) -> Outcome {
        let response = ApiResponse::new(status, HeaderMap::new(), Vec::new(), "http://a/");
        Err(ApiError::from_response(&response))
    }

    fn counting_events() -> (AuthEvents, Arc<AtomicUsize>) {
        let events = AuthEvents::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        events.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (events, count)
    }

    #[test]
    fn test_bearer_token_injected() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let request = BearerToken::new(store)
            .on_request(ApiRequest::get("users/"))
            .unwrap();

        assert_eq!(request.header("Authorization"), Some("Bearer abc123"));
    }

    #[test]
    fn test_bearer_token_absent() {
        let store = Arc::new(MemoryStore::new());
        let request = BearerToken::new(store)
            .on_request(ApiRequest::get("users/"))
            .unwrap();

        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn test_bearer_token_empty_is_absent() {
        let store = Arc::new(MemoryStore::with_token(""));
        let request = BearerToken::new(store)
            .on_request(ApiRequest::get("users/"))
            .unwrap();

        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn test_auth_guard_401_clears_token_and_emits() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let (events, count) = counting_events();
        let guard = AuthGuard::new(store.clone(), events);

        let outcome = guard.on_response(failure(401));

        assert!(outcome.unwrap_err().is_auth_error());
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_auth_guard_403_keeps_token() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let (events, count) = counting_events();
        let guard = AuthGuard::new(store.clone(), events);

        let outcome = guard.on_response(failure(403));

        assert!(outcome.unwrap_err().is_auth_error());
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc123"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_auth_guard_ignores_other_failures() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let (events, count) = counting_events();
        let guard = AuthGuard::new(store.clone(), events);

        let _ = guard.on_response(failure(500));
        let _ = guard.on_response(Err(ApiError::new(ErrorKind::Network, "refused")));

        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc123"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pipeline_runs_stages_in_order() {
        let pipeline = Pipeline::new()
            .with_request_stage(|r: ApiRequest| -> Result<ApiRequest, ApiError> {
                Ok(r.with_header("x-order", "first"))
            })
            .with_request_stage(|r: ApiRequest| -> Result<ApiRequest, ApiError> {
                let previous = r.header("x-order").unwrap_or_default().to_string();
                Ok(r.with_header("x-order", format!("{},second", previous)))
            });

        let request = pipeline.prepare(ApiRequest::get("officers")).unwrap();
        assert_eq!(request.header("x-order"), Some("first,second"));
    }

    #[test]
    fn test_pipeline_request_stage_error_stops_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let pipeline = Pipeline::new()
            .with_request_stage(|_: ApiRequest| -> Result<ApiRequest, ApiError> {
                Err(ApiError::new(ErrorKind::InvalidRequest, "no token store"))
            })
            .with_request_stage(move |r: ApiRequest| -> Result<ApiRequest, ApiError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(r)
            });

        let err = pipeline.prepare(ApiRequest::get("officers")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pipeline_response_stages_see_outcome() {
        let pipeline = Pipeline::new().with_response_stage(|outcome: Outcome| {
            outcome.map_err(|e| ApiError::new(e.kind(), format!("wrapped: {}", e.message())))
        });

        let err = pipeline.complete(failure(404)).unwrap_err();
        assert_eq!(err.message(), "wrapped: Not Found");
    }
}

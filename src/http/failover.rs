//! Fallback endpoints: automatic failover, the manual multi-endpoint helper
//! and connectivity probes.

use futures_util::future::join_all;
use log::{debug, info, warn};
use serde_json::{Value, json};

use super::client::ApiClient;
use super::error::ApiError;
use super::request::{ApiRequest, Attempt};
use super::response::ApiResponse;

/// Result of a health probe. Probing never fails; an unreachable endpoint is
/// a value like any other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    Reachable { endpoint: String },
    Unreachable { error: String },
}

impl Connectivity {
    pub fn success(&self) -> bool {
        matches!(self, Connectivity::Reachable { .. })
    }

    /// `{"success": true, "endpoint": ..}` or `{"success": false, "error": ..}`.
    pub fn to_json(&self) -> Value {
        match self {
            Connectivity::Reachable { endpoint } => json!({"success": true, "endpoint": endpoint}),
            Connectivity::Unreachable { error } => json!({"success": false, "error": error}),
        }
    }

    fn from_outcome(outcome: Result<ApiResponse, ApiError>) -> Self {
        match outcome {
            Ok(response) => Connectivity::Reachable {
                endpoint: response.endpoint().to_string(),
            },
            Err(error) => Connectivity::Unreachable {
                error: error.to_string(),
            },
        }
    }
}

impl ApiClient {
    /// Replays a request that hit a network error against each fallback in
    /// order. The first fallback that answers with success becomes the
    /// active endpoint for every later request. A fallback that answers
    /// 401 or 403 ends the scan with that auth error.
    ///
    /// Does nothing but return `original` when `attempt` is already
    /// [`Attempt::Retried`] or no other fallback is configured.
    #[tracing::instrument(skip(self, request, original), fields(path = request.path()))]
    pub async fn retry_with_fallback(
        &self,
        request: &ApiRequest,
        attempt: Attempt,
        failed_endpoint: &str,
        original: ApiError,
    ) -> Result<ApiResponse, ApiError> {
        if !attempt.may_fail_over() {
            debug!("Request already failed over once, giving up: {}", original);
            return Err(original);
        }

        let candidates: Vec<&String> = self
            .endpoints()
            .fallbacks()
            .iter()
            .filter(|candidate| candidate.as_str() != failed_endpoint)
            .collect();

        if candidates.is_empty() {
            return Err(original);
        }

        warn!(
            "{} is unreachable ({}), trying {} fallback endpoint(s)...",
            failed_endpoint,
            original.message(),
            candidates.len()
        );

        // Every candidate is dispatched without a further failover step.
        for candidate in &candidates {
            match self.exchange(request, candidate).await {
                Ok(response) => {
                    info!("Fallback endpoint {} answered, switching to it", candidate);
                    self.set_active_endpoint(candidate);
                    return Ok(response);
                }
                // Rejected credentials end the scan.
                Err(error) if error.is_auth_error() => {
                    warn!("Fallback endpoint {} rejected credentials: {}", candidate, error);
                    return Err(error);
                }
                Err(error) => {
                    warn!("Fallback endpoint {} failed: {}", candidate, error);
                }
            }
        }

        // The endpoint that failed first counts as tried.
        Err(ApiError::all_endpoints_unavailable(
            &original,
            candidates.len() + 1,
        ))
    }

    /// Tries the active endpoint, then every other configured endpoint in
    /// order, moving on only when no response arrived at all.
    ///
    /// An endpoint that answers, even with an error status, ends the scan.
    /// The endpoint that served the request becomes active.
    #[tracing::instrument(skip(self, request), fields(path = request.path()))]
    pub async fn request_any(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let active = self.active_endpoint();
        let mut order = vec![active.clone()];
        order.extend(self.endpoints().all().into_iter().filter(|e| *e != active));

        let mut last_error = None;
        for endpoint in &order {
            match self.exchange(&request, endpoint).await {
                Ok(response) => {
                    self.set_active_endpoint(endpoint);
                    return Ok(response);
                }
                Err(error) if error.is_network_error() || error.is_timeout() => {
                    warn!("Endpoint {} did not answer: {}", endpoint, error);
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        match last_error {
            Some(error) => Err(ApiError::all_endpoints_unavailable(&error, order.len())),
            None => Err(ApiError::new(
                super::error::ErrorKind::AllEndpointsUnavailable,
                "no endpoints configured",
            )),
        }
    }

    /// GETs the health path on the active endpoint through the normal
    /// request path. Never returns an error.
    #[tracing::instrument(skip(self))]
    pub async fn test_connectivity(&self) -> Connectivity {
        let outcome = self.send(ApiRequest::get(self.health_path())).await;
        let connectivity = Connectivity::from_outcome(outcome);
        debug!("Connectivity: {:?}", connectivity);
        connectivity
    }

    /// Probes the health path on every configured endpoint concurrently,
    /// leaving the active endpoint and the stored session untouched.
    #[tracing::instrument(skip(self))]
    pub async fn probe_endpoints(&self) -> Vec<(String, Connectivity)> {
        let endpoints = self.endpoints().all();
        let request = ApiRequest::get(self.health_path());

        let probes = endpoints.iter().map(|endpoint| {
            let request = &request;
            async move {
                let outcome = self.exchange_unguarded(request, endpoint).await;
                (endpoint.clone(), Connectivity::from_outcome(outcome))
            }
        });

        join_all(probes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Endpoints, ErrorKind};
    use crate::session::{AuthEvents, MemoryStore, TOKEN_KEY, TokenStore};
    use mockito::Matcher;
    use reqwest::Client;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Nothing listens on port 1.
    const DEAD: &str = "http://127.0.0.1:1/api/";
    const DEAD_TOO: &str = "http://127.0.0.1:2/api/";

    fn client(primary: &str, fallbacks: Vec<String>) -> ApiClient {
        ApiClient::with_session(
            Client::new(),
            Endpoints::new(primary, fallbacks),
            Arc::new(MemoryStore::with_token("abc123")),
            AuthEvents::new(),
        )
    }

    #[test_log::test(tokio::test)]
    async fn test_failover_to_backup_is_transparent() {
        let mut backup = mockito::Server::new_async().await;
        let mock = backup
            .mock("POST", "/api/dailyCollections")
            .match_header("Authorization", "Bearer abc123")
            .with_status(200)
            .with_body(r#"{"saved": true}"#)
            .create_async()
            .await;
        let backup_url = format!("{}/api/", backup.url());

        let client = client(DEAD, vec![backup_url.clone()]);
        let response = client
            .post("dailyCollections", serde_json::json!({"amount": 100}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text(), r#"{"saved": true}"#);
        assert_eq!(response.endpoint(), backup_url);
        assert_eq!(client.active_endpoint(), backup_url);
    }

    #[tokio::test]
    async fn test_failover_order_and_short_circuit() {
        let mut second = mockito::Server::new_async().await;
        let mut third = mockito::Server::new_async().await;

        let second_mock = second
            .mock("GET", "/officers")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let third_mock = third
            .mock("GET", "/officers")
            .expect(0)
            .create_async()
            .await;

        let client = client(
            DEAD,
            vec![DEAD_TOO.to_string(), second.url(), third.url()],
        );
        client.get("officers").await.unwrap();

        second_mock.assert_async().await;
        third_mock.assert_async().await;
        assert_eq!(client.active_endpoint(), second.url());
    }

    #[tokio::test]
    async fn test_later_requests_use_new_active_endpoint() {
        let mut backup = mockito::Server::new_async().await;
        let mock = backup
            .mock("GET", Matcher::Regex("^/(officers|users/)$".to_string()))
            .with_status(200)
            .with_body("[]")
            .expect(2)
            .create_async()
            .await;

        let client = client(DEAD, vec![backup.url()]);
        client.get("officers").await.unwrap();
        client.get("users/").await.unwrap();

        mock.assert_async().await;
        assert_eq!(client.active_endpoint(), backup.url());
    }

    #[tokio::test]
    async fn test_all_fallbacks_fail() {
        let client = client(DEAD, vec![DEAD_TOO.to_string()]);

        let err = client.get("officers").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AllEndpointsUnavailable);
        assert!(err.is_network_error());
        assert!(err.message().ends_with("(2 endpoint(s) tried)"));
        assert!(!err.timestamp().is_empty());
        assert_eq!(client.active_endpoint(), DEAD);
    }

    #[tokio::test]
    async fn test_no_fallbacks_returns_network_error() {
        let client = client(DEAD, vec![]);

        let err = client.get("officers").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_retried_request_never_fails_over_again() {
        let mut backup = mockito::Server::new_async().await;
        let mock = backup
            .mock("GET", "/officers")
            .expect(0)
            .create_async()
            .await;

        let client = client(DEAD, vec![backup.url()]);
        let err = client
            .send_attempt(ApiRequest::get("officers"), Attempt::Retried)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(client.active_endpoint(), DEAD);
    }

    #[tokio::test]
    async fn test_fallback_http_error_moves_on() {
        let mut broken = mockito::Server::new_async().await;
        let mut healthy = mockito::Server::new_async().await;
        let _broken = broken
            .mock("GET", "/officers")
            .with_status(503)
            .create_async()
            .await;
        let healthy_mock = healthy
            .mock("GET", "/officers")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = client(DEAD, vec![broken.url(), healthy.url()]);
        client.get("officers").await.unwrap();

        healthy_mock.assert_async().await;
        assert_eq!(client.active_endpoint(), healthy.url());
    }

    #[tokio::test]
    async fn test_fallback_unauthorized_stops_scan() {
        let mut rejecting = mockito::Server::new_async().await;
        let mut next = mockito::Server::new_async().await;
        let rejecting_mock = rejecting
            .mock("GET", "/officers")
            .match_header("Authorization", "Bearer abc123")
            .with_status(401)
            .with_body(r#"{"message": "jwt expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let next_mock = next
            .mock("GET", "/officers")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::with_token("abc123"));
        let events = AuthEvents::new();
        let expired = Arc::new(AtomicUsize::new(0));
        let counter = expired.clone();
        events.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let client = ApiClient::with_session(
            Client::new(),
            Endpoints::new(DEAD, vec![rejecting.url(), next.url()]),
            store.clone(),
            events,
        );
        let err = client.get("officers").await.unwrap_err();

        rejecting_mock.assert_async().await;
        next_mock.assert_async().await;
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.is_auth_error());
        assert!(!err.is_network_error());
        assert_eq!(err.status(), Some(401));
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(expired.load(Ordering::SeqCst), 1);
        assert_eq!(client.active_endpoint(), DEAD);
    }

    #[tokio::test]
    async fn test_fallback_forbidden_stops_scan() {
        let mut forbidding = mockito::Server::new_async().await;
        let mut next = mockito::Server::new_async().await;
        let _forbidding = forbidding
            .mock("GET", "/officers")
            .with_status(403)
            .create_async()
            .await;
        let next_mock = next
            .mock("GET", "/officers")
            .expect(0)
            .create_async()
            .await;

        let client = client(DEAD, vec![forbidding.url(), next.url()]);
        let err = client.get("officers").await.unwrap_err();

        next_mock.assert_async().await;
        assert!(err.is_auth_error());
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_fallback_reattaches_current_token() {
        let store = Arc::new(MemoryStore::with_token("fresh"));
        let mut backup = mockito::Server::new_async().await;
        let mock = backup
            .mock("GET", "/officers")
            .match_header("Authorization", "Bearer fresh")
            .with_status(200)
            .create_async()
            .await;

        let client = ApiClient::with_session(
            Client::new(),
            Endpoints::new(DEAD, vec![backup.url()]),
            store.clone(),
            AuthEvents::new(),
        );
        client.get("officers").await.unwrap();

        mock.assert_async().await;
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_request_any_stops_on_http_error() {
        let mut primary = mockito::Server::new_async().await;
        let mut backup = mockito::Server::new_async().await;
        let _primary = primary
            .mock("GET", "/users/9")
            .with_status(404)
            .create_async()
            .await;
        let backup_mock = backup
            .mock("GET", "/users/9")
            .expect(0)
            .create_async()
            .await;

        let client = client(&primary.url(), vec![backup.url()]);
        let err = client
            .request_any(ApiRequest::get("users/9"))
            .await
            .unwrap_err();

        backup_mock.assert_async().await;
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_request_any_walks_all_endpoints() {
        let mut last = mockito::Server::new_async().await;
        let mock = last
            .mock("GET", "/weeklyCollections")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client(DEAD, vec![DEAD_TOO.to_string(), last.url()]);
        client
            .request_any(ApiRequest::get("weeklyCollections"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(client.active_endpoint(), last.url());
    }

    #[tokio::test]
    async fn test_request_any_exhausted() {
        let client = client(DEAD, vec![DEAD_TOO.to_string()]);

        let err = client
            .request_any(ApiRequest::get("officers"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AllEndpointsUnavailable);
        assert!(err.message().ends_with("(2 endpoint(s) tried)"));
    }

    #[tokio::test]
    async fn test_connectivity_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .create_async()
            .await;

        let client = client(&server.url(), vec![]);
        let connectivity = client.test_connectivity().await;

        assert!(connectivity.success());
        assert_eq!(
            connectivity,
            Connectivity::Reachable {
                endpoint: server.url()
            }
        );
        assert_eq!(connectivity.to_json()["success"], true);
    }

    #[tokio::test]
    async fn test_connectivity_failure_does_not_throw() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/health")
            .with_status(500)
            .create_async()
            .await;

        let client = client(&server.url(), vec![]);
        let connectivity = client.test_connectivity().await;

        assert!(!connectivity.success());
        let json = connectivity.to_json();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_connectivity_custom_health_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status/ping")
            .with_status(204)
            .create_async()
            .await;

        let client = client(&server.url(), vec![]).with_health_path("status/ping");
        assert!(client.test_connectivity().await.success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_endpoints_reports_each() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;

        let client = client(&server.url(), vec![DEAD.to_string()]);
        let results = client.probe_endpoints().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, server.url());
        assert!(results[0].1.success());
        assert_eq!(results[1].0, DEAD);
        assert!(!results[1].1.success());
        assert_eq!(client.active_endpoint(), server.url());
    }

    #[tokio::test]
    async fn test_probe_unauthorized_keeps_session() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/health")
            .with_status(401)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::with_token("abc123"));
        let events = AuthEvents::new();
        let expired = Arc::new(AtomicUsize::new(0));
        let counter = expired.clone();
        events.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let client = ApiClient::with_session(
            Client::new(),
            Endpoints::new(server.url(), vec![]),
            store.clone(),
            events,
        );
        let results = client.probe_endpoints().await;

        assert!(!results[0].1.success());
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc123"));
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }
}

//! Error classification for API calls.
//!
//! Every failed call is turned into an [`ApiError`] exactly once, where the
//! response (or the lack of one) is first seen. Callers branch on the flag
//! accessors instead of re-inspecting status codes.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;

use super::response::ApiResponse;

/// What went wrong with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 401 or 403
    Auth,
    /// The client-side timeout elapsed before a response arrived
    Timeout,
    /// No response was received at all (DNS failure, connection refused, reset)
    Network,
    /// A response with status >= 500
    Server,
    /// Any other non-2xx response
    Api,
    /// A network failure that every fallback endpoint also failed to serve
    AllEndpointsUnavailable,
    /// A successful response whose body was not the expected JSON
    Decode,
    /// The request could not be built or prepared
    InvalidRequest,
}

/// A classified API failure.
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: ErrorKind,
    status: Option<u16>,
    body: Option<String>,
    message: String,
    endpoint: Option<String>,
    captured_at: DateTime<Utc>,
}

/// Returns true for statuses in `[200, 300)`.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Maps a non-2xx status onto an error kind.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Auth,
        s if s >= 500 => ErrorKind::Server,
        _ => ErrorKind::Api,
    }
}

impl ApiError {
    /// Creates an error of the given kind, stamped with the current time.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            body: None,
            message: message.into(),
            endpoint: None,
            captured_at: Utc::now(),
        }
    }

    /// Classifies a completed non-2xx response.
    pub fn from_response(response: &ApiResponse) -> Self {
        let status = response.status();
        let body = response.text();
        let message = server_message(&body).unwrap_or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unexpected status")
                .to_string()
        });

        let mut error = Self::new(classify_status(status), message)
            .with_status(status)
            .with_endpoint(response.endpoint());
        if !body.is_empty() {
            error.body = Some(body);
        }
        error
    }

    /// Classifies a transport failure reported by reqwest.
    pub fn from_transport(error: &reqwest::Error, endpoint: &str) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else if error.is_builder() {
            ErrorKind::InvalidRequest
        } else if error.is_decode() {
            ErrorKind::Decode
        } else {
            ErrorKind::Network
        };

        Self::new(kind, error_chain(error)).with_endpoint(endpoint)
    }

    /// The error raised once every endpoint tried has failed. `attempted`
    /// counts all of them, the one that failed first included.
    pub fn all_endpoints_unavailable(original: &ApiError, attempted: usize) -> Self {
        Self::new(
            ErrorKind::AllEndpointsUnavailable,
            format!("{} ({} endpoint(s) tried)", original.message, attempted),
        )
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The raw body the server sent with the failure, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The base URL the failing attempt was sent to.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Capture time as an RFC 3339 string.
    pub fn timestamp(&self) -> String {
        self.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn is_auth_error(&self) -> bool {
        self.kind == ErrorKind::Auth
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_network_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network | ErrorKind::AllEndpointsUnavailable
        )
    }

    pub fn is_server_error(&self) -> bool {
        self.kind == ErrorKind::Server
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ErrorKind::Auth => match self.status {
                Some(403) => write!(f, "Access forbidden: {}", self.message),
                _ => write!(
                    f,
                    "Authentication failed: {}. Sign in again and store a new token.",
                    self.message
                ),
            },
            ErrorKind::Timeout => write!(f, "Request timed out: {}", self.message),
            ErrorKind::Network => write!(f, "Network error: {}", self.message),
            ErrorKind::AllEndpointsUnavailable => {
                write!(f, "All API endpoints are unavailable: {}", self.message)
            }
            ErrorKind::Server | ErrorKind::Api => match self.status {
                Some(status) => write!(f, "HTTP {}: {}", status, self.message),
                None => write!(f, "Request error: {}", self.message),
            },
            ErrorKind::Decode => write!(f, "Unexpected response body: {}", self.message),
            ErrorKind::InvalidRequest => write!(f, "Invalid request: {}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Pulls a human readable message out of a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// reqwest's top-level message hides the cause ("error sending request"),
/// so the whole source chain is joined.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

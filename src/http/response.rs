//! Completed responses.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use super::error::{ApiError, ErrorKind};

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    endpoint: String,
}

impl ApiResponse {
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>, endpoint: &str) -> Self {
        Self {
            status,
            headers,
            body,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The base URL that served this response.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Decodes the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };

        serde_json::from_slice(body).map_err(|e| {
            ApiError::new(
                ErrorKind::Decode,
                format!("Failed to parse JSON response: {}", e),
            )
            .with_status(self.status)
            .with_endpoint(&self.endpoint)
        })
    }
}

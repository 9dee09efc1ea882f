//! HTTP transport types and the executor seam.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The core
//! builds `HttpRequest` values and parses `HttpResponse` values without ever
//! touching the network; an [`HttpExecutor`] implementation performs the
//! actual round trip. This separation keeps request building and response
//! interpretation deterministic and lets tests script the transport.
//!
//! The executor owns exactly one decision: mapping transport-level failures
//! to `Timeout` or `ConnectionLost`. Status interpretation and body decoding
//! belong to the parse side of `ApiClient`.

use async_trait::async_trait;

use crate::error::SyncError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `ApiClient::build_*` methods and handed to an [`HttpExecutor`]
/// for execution.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value with the given name, if present. Case-sensitive;
    /// the builders emit canonical names.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Produced by an [`HttpExecutor`] after executing an `HttpRequest`, then
/// passed to `ApiClient::parse_*` methods for interpretation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Executes a described request against the real network (or a script).
///
/// Implementations fail with [`SyncError::Timeout`] when the deadline
/// elapses and [`SyncError::ConnectionLost`] when the connection breaks;
/// any completed exchange, whatever its status code, is returned as a
/// response.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SyncError>;
}

#[cfg(feature = "net")]
pub use net::ReqwestExecutor;

#[cfg(feature = "net")]
mod net {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse};
    use crate::error::SyncError;

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Production executor backed by a pooled `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestExecutor {
        client: reqwest::Client,
    }

    impl ReqwestExecutor {
        pub fn new() -> Result<Self, SyncError> {
            Self::with_timeout(DEFAULT_TIMEOUT)
        }

        pub fn with_timeout(timeout: Duration) -> Result<Self, SyncError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| SyncError::ConnectionLost(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpExecutor for ReqwestExecutor {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Patch => reqwest::Method::PATCH,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, &request.path);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.text().await.map_err(classify)?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

    /// Map a reqwest failure onto the transport error taxonomy. Only
    /// timeouts and broken connections are transient; anything else that
    /// prevented a usable exchange is a bad response.
    fn classify(err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            return SyncError::Timeout;
        }
        if err.is_connect() {
            return SyncError::ConnectionLost(err.to_string());
        }
        let detail = err.to_string();
        let lowered = detail.to_lowercase();
        if lowered.contains("connection reset")
            || lowered.contains("connection closed")
            || lowered.contains("broken pipe")
        {
            return SyncError::ConnectionLost(detail);
        }
        SyncError::BadResponse(detail)
    }
}

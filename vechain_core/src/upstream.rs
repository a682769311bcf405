//! HTTP utilities for calling third-party JSON APIs
//!
//! This module provides:
//! - [`UpstreamRequest`]: a `GET`/`POST` request description with query parameters,
//!   secret query parameters (API keys, never logged or echoed) and an optional JSON body
//! - [`HttpFeatures`]: the trait contexts implement to execute upstream requests
//! - [`send_json`]: the reqwest-backed executor with a bounded timeout and cancellation
//! - [`UpstreamError`]: transport failures, converted into [`CapabilityError::Upstream`]

use reqwest::Client;
use serde_json::Value;
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::CapabilityError;

pub static CONTENT_TYPE_JSON: &str = "application/json";

const MAX_ERROR_BODY: usize = 256;

/// An outbound request to a third-party JSON API.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
    pub method: http::Method,
    /// URL without query string
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Query parameters carrying credentials. Sent, but never part of [`Self::endpoint`].
    pub secret_query: Vec<(String, String)>,
    pub headers: http::HeaderMap,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(http::Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        let mut req = Self::new(http::Method::POST, url);
        req.body = Some(body);
        req
    }

    fn new(method: http::Method, url: impl Into<String>) -> Self {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static(CONTENT_TYPE_JSON),
        );
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            secret_query: Vec::new(),
            headers,
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn secret_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.secret_query.push((key.to_string(), value.into()));
        self
    }

    /// Returns the query value for `key`, secret parameters excluded.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The request URL without any query parameters, safe to log and to return to callers.
    pub fn endpoint(&self) -> &str {
        &self.url
    }
}

/// HttpFeatures lets capabilities reach third-party APIs.
///
/// Contexts decide how the request is executed: the engine's context sends it with
/// reqwest under a timeout, test contexts answer from fixtures.
pub trait HttpFeatures: Sized {
    /// Executes the request and returns the parsed JSON body of a 2xx response.
    fn fetch_json(
        &self,
        req: UpstreamRequest,
    ) -> impl Future<Output = Result<Value, CapabilityError>> + Send;
}

/// Possible transport failures of an upstream call
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("send error: {error}")]
    RequestError { endpoint: String, error: String },

    #[error("response status {status}, error: {error}")]
    ResponseError {
        endpoint: String,
        status: u16,
        error: String,
    },

    #[error("parse result error: {error}")]
    ResultError { endpoint: String, error: String },

    #[error("timed out after {}ms", .timeout.as_millis())]
    Timeout { endpoint: String, timeout: Duration },

    #[error("request cancelled")]
    Cancelled { endpoint: String },
}

impl UpstreamError {
    pub fn endpoint(&self) -> &str {
        match self {
            UpstreamError::RequestError { endpoint, .. }
            | UpstreamError::ResponseError { endpoint, .. }
            | UpstreamError::ResultError { endpoint, .. }
            | UpstreamError::Timeout { endpoint, .. }
            | UpstreamError::Cancelled { endpoint } => endpoint,
        }
    }
}

impl From<UpstreamError> for CapabilityError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Cancelled { endpoint } => {
                CapabilityError::cancelled(format_args!("request to {endpoint}"))
            }
            err => CapabilityError::Upstream {
                endpoint: err.endpoint().to_string(),
                message: err.to_string(),
            },
        }
    }
}

fn truncate(mut s: String) -> String {
    if s.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("...");
    }
    s
}

/// Sends an upstream request and parses the JSON response.
///
/// The call is bounded by `timeout` and aborted as soon as `cancel` fires; dropping the
/// in-flight reqwest future closes the underlying request. No retries are made.
///
/// # Arguments
/// * `client` - HTTP client to use for the request
/// * `req` - The request to send
/// * `timeout` - Upper bound for the whole call, body included
/// * `cancel` - Cancellation token of the invoking context
pub async fn send_json(
    client: &Client,
    req: UpstreamRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Value, UpstreamError> {
    let endpoint = req.endpoint().to_string();
    let call = async {
        let mut builder = client
            .request(req.method.clone(), &req.url)
            .headers(req.headers.clone());
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if !req.secret_query.is_empty() {
            builder = builder.query(&req.secret_query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| UpstreamError::RequestError {
                endpoint: endpoint.clone(),
                error: e.without_url().to_string(),
            })?;
        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::ResponseError {
                endpoint: endpoint.clone(),
                status: status.as_u16(),
                error: truncate(res.text().await.unwrap_or_default()),
            });
        }

        let data = res.bytes().await.map_err(|e| UpstreamError::ResultError {
            endpoint: endpoint.clone(),
            error: e.without_url().to_string(),
        })?;
        serde_json::from_slice::<Value>(&data).map_err(|e| UpstreamError::ResultError {
            endpoint: endpoint.clone(),
            error: format!("malformed JSON: {e}"),
        })
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UpstreamError::Cancelled { endpoint: endpoint.clone() }),
        res = tokio::time::timeout(timeout, call) => match res {
            Ok(res) => res,
            Err(_) => Err(UpstreamError::Timeout { endpoint: endpoint.clone(), timeout }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_hides_secrets() {
        let req = UpstreamRequest::get("https://api.vechainstats.com/v2/token/info")
            .query("token", "vtho")
            .secret_query("VCS_API_KEY", "secret");
        assert_eq!(req.endpoint(), "https://api.vechainstats.com/v2/token/info");
        assert_eq!(req.query_value("token"), Some("vtho"));
        assert_eq!(req.query_value("VCS_API_KEY"), None);
    }

    #[test]
    fn test_upstream_error_conversion() {
        let err: CapabilityError = UpstreamError::ResponseError {
            endpoint: "https://bridge-api.wanchain.org/api/tokenPairs".to_string(),
            status: 502,
            error: "bad gateway".to_string(),
        }
        .into();
        assert_eq!(err.kind(), crate::ErrorKind::Upstream);
        assert_eq!(
            err.to_string(),
            "https://bridge-api.wanchain.org/api/tokenPairs: response status 502, error: bad gateway"
        );
    }

    #[test]
    fn test_truncate_error_body() {
        let body = "x".repeat(1000);
        let s = truncate(body);
        assert_eq!(s.len(), MAX_ERROR_BODY + 3);
    }

    #[tokio::test]
    async fn test_send_json_timeout() {
        // accepts the connection, never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let client = Client::new();
        let req = UpstreamRequest::get(format!("http://{addr}/slow"));
        let started = std::time::Instant::now();
        let res = send_json(
            &client,
            req,
            Duration::from_millis(100),
            &CancellationToken::new(),
        )
        .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        let err = res.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout { .. }), "{err:?}");

        let err: CapabilityError = err.into();
        assert_eq!(err.kind(), crate::ErrorKind::Upstream);
        assert_eq!(
            err.to_string(),
            format!("http://{addr}/slow: timed out after 100ms")
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_send_json_cancelled() {
        let client = Client::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = UpstreamRequest::get("https://127.0.0.1:9/unreachable");
        let res = send_json(&client, req, Duration::from_secs(5), &cancel).await;
        assert!(matches!(res, Err(UpstreamError::Cancelled { .. })));

        let err: CapabilityError = res.unwrap_err().into();
        assert_eq!(err.kind(), crate::ErrorKind::Execution);
        assert_eq!(
            err.to_string(),
            "request to https://127.0.0.1:9/unreachable was cancelled"
        );
    }
}

use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use structured_logger::unix_ms;
use vechain_core::{
    BaseContext, BoxError, CancellationToken, CapabilityError, HttpFeatures, UpstreamRequest,
    send_json,
};

use crate::APP_USER_AGENT;

/// Per-invocation context backed by a shared reqwest client.
#[derive(Clone)]
pub struct BaseCtx {
    pub(crate) name: String,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) start_at: Instant,

    http: Client,
    timeout: Duration,
}

impl BaseCtx {
    /// Creates the root context of an engine.
    ///
    /// # Arguments
    /// * `cancellation_token` - Cancelling it aborts every in-flight invocation
    /// * `timeout` - Upper bound of each upstream call
    pub fn new(cancellation_token: CancellationToken, timeout: Duration) -> Result<Self, BoxError> {
        let http = Client::builder()
            .use_rustls_tls()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .gzip(true)
            .user_agent(APP_USER_AGENT)
            .build()?;

        Ok(Self {
            name: String::new(),
            cancellation_token,
            start_at: Instant::now(),
            http,
            timeout,
        })
    }

    /// Derives the context of a single invocation, sharing the HTTP client.
    pub(crate) fn child(&self, name: &str, cancellation_token: CancellationToken) -> Self {
        Self {
            name: name.to_string(),
            cancellation_token,
            start_at: Instant::now(),
            http: self.http.clone(),
            timeout: self.timeout,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_at.elapsed()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl HttpFeatures for BaseCtx {
    async fn fetch_json(&self, req: UpstreamRequest) -> Result<Value, CapabilityError> {
        log::debug!(
            name = self.name.as_str(),
            method = req.method.as_str(),
            endpoint = req.endpoint();
            "upstream request"
        );
        send_json(&self.http, req, self.timeout, &self.cancellation_token)
            .await
            .map_err(|err| {
                log::warn!(
                    name = self.name.as_str(),
                    endpoint = err.endpoint(),
                    error = err.to_string();
                    "upstream request failed"
                );
                err.into()
            })
    }
}

impl BaseContext for BaseCtx {
    fn capability_name(&self) -> &str {
        &self.name
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    fn unix_ms(&self) -> u64 {
        unix_ms()
    }
}

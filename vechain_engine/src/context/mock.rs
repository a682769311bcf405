//! Fixture-driven context for tests.
//!
//! ```rust,ignore
//! let ctx = MockCtx::new(|req| match req.endpoint() {
//!     "https://api.vechainstats.com/v2/token/info" => Ok(json!({"status": {"success": true}, "data": {..}})),
//!     other => Err(CapabilityError::upstream(other, "unexpected request")),
//! });
//! ```

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use vechain_core::{
    BaseContext, CancellationToken, CapabilityError, HttpFeatures, UpstreamRequest,
};

type Handler = dyn Fn(&UpstreamRequest) -> Result<Value, CapabilityError> + Send + Sync;

/// A context whose upstream calls are answered by a closure. Every request is recorded
/// and the clock is fixed, so results are reproducible.
#[derive(Clone)]
pub struct MockCtx {
    name: String,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<UpstreamRequest>>>,
    now_ms: u64,
    cancellation_token: CancellationToken,
}

impl MockCtx {
    pub const NOW_MS: u64 = 1_700_000_000_000;

    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&UpstreamRequest) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            name: "mock".to_string(),
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
            now_ms: Self::NOW_MS,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// A context where every upstream call fails.
    pub fn offline() -> Self {
        Self::new(|req| Err(CapabilityError::upstream(req.endpoint(), "offline")))
    }

    pub fn with_unix_ms(mut self, now_ms: u64) -> Self {
        self.now_ms = now_ms;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Requests issued so far, in order.
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().clone()
    }
}

impl HttpFeatures for MockCtx {
    async fn fetch_json(&self, req: UpstreamRequest) -> Result<Value, CapabilityError> {
        self.requests.lock().push(req.clone());
        if self.cancellation_token.is_cancelled() {
            return Err(CapabilityError::cancelled(format_args!(
                "request to {}",
                req.endpoint()
            )));
        }
        (self.handler)(&req)
    }
}

impl BaseContext for MockCtx {
    fn capability_name(&self) -> &str {
        &self.name
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    fn unix_ms(&self) -> u64 {
        self.now_ms
    }
}

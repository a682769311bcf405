//! Dispatch façade between an orchestrating agent and the capability registry.
//!
//! # Usage
//! ```rust,ignore
//! let engine = Engine::builder()
//!     .with_name("vechain".to_string())
//!     .with_timeout(cfg.http.timeout())
//!     .register_capability(TokenTransferTool::new(builder, resolver))?
//!     .build()?;
//!
//! let catalog = engine.list_capabilities();
//! let res = engine.invoke("token_transfer", json!({..})).await;
//! ```

use serde_json::Value;
use std::{sync::Arc, time::Duration};
use vechain_core::{
    BoxError, CancellationToken, Capability, CapabilityDefinition, CapabilityError,
    CapabilityResult, CapabilitySet,
};

use crate::context::BaseCtx;

/// A read-only capability catalog plus the root context invocations derive from.
#[derive(Clone)]
pub struct Engine {
    name: String,
    ctx: BaseCtx,
    capabilities: Arc<CapabilitySet<BaseCtx>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel all in-flight invocations.
    pub fn cancel(&self) {
        self.ctx.cancellation_token.cancel()
    }

    /// Catalog introspection: name, kind and argument schema of every capability.
    pub fn list_capabilities(&self) -> Vec<CapabilityDefinition> {
        self.capabilities.definitions(None)
    }

    pub fn capability_definitions(&self, names: Option<&[&str]>) -> Vec<CapabilityDefinition> {
        self.capabilities.definitions(names)
    }

    /// Invokes a capability by name. Never fails: every error is returned as data.
    pub async fn invoke(&self, name: &str, args: Value) -> CapabilityResult {
        self.invoke_with_cancel(name, args, CancellationToken::new())
            .await
    }

    /// Invokes a capability, abandoning it as soon as `cancel` fires.
    ///
    /// Abandoning drops the in-flight future, which aborts its upstream requests.
    pub async fn invoke_with_cancel(
        &self,
        name: &str,
        args: Value,
        cancel: CancellationToken,
    ) -> CapabilityResult {
        let capability = match self.capabilities.resolve(name) {
            Ok(capability) => capability,
            Err(err) => {
                log::warn!(name = name; "capability not found");
                return err.into();
            }
        };

        let token = self.ctx.cancellation_token.child_token();
        let ctx = self.ctx.child(name, token.clone());
        let kind = capability.kind();
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                token.cancel();
                CapabilityError::cancelled(format_args!("invocation of {name}")).into()
            }
            res = capability.invoke(ctx.clone(), args) => res,
        };

        let outcome = res.error_kind().map(|k| k.as_str()).unwrap_or("ok");
        log::info!(
            name = name,
            kind = format!("{kind:?}"),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            outcome = outcome;
            "invoke"
        );
        res
    }
}

pub struct EngineBuilder {
    name: String,
    capabilities: CapabilitySet<BaseCtx>,
    timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder {
            name: "vechain".to_string(),
            capabilities: CapabilitySet::new(),
            timeout: Duration::from_secs(15),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    /// Upper bound of each upstream call made by read capabilities.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, cancellation_token: CancellationToken) -> Self {
        self.cancellation_token = cancellation_token;
        self
    }

    pub fn register_capability<T>(mut self, capability: T) -> Result<Self, CapabilityError>
    where
        T: Capability<BaseCtx> + 'static,
    {
        self.capabilities.register(capability)?;
        Ok(self)
    }

    pub fn register_capabilities(
        mut self,
        capabilities: CapabilitySet<BaseCtx>,
    ) -> Result<Self, CapabilityError> {
        self.capabilities.merge(capabilities)?;
        Ok(self)
    }

    /// Freezes the catalog. No capability can be registered afterwards.
    pub fn build(self) -> Result<Engine, BoxError> {
        let ctx = BaseCtx::new(self.cancellation_token, self.timeout)?;
        log::info!(
            name = self.name.as_str(),
            capabilities = self.capabilities.len();
            "engine built"
        );
        Ok(Engine {
            name: self.name,
            ctx,
            capabilities: Arc::new(self.capabilities),
        })
    }
}

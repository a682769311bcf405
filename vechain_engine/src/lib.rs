//! Runtime side of the VeChain capability registry: configuration, the per-call
//! context handed to capabilities, and the [`engine::Engine`] an orchestrator talks to.

pub mod config;
pub mod context;
pub mod engine;

pub static APP_USER_AGENT: &str = concat!(
    "Mozilla/5.0 vechain-agent ",
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
);

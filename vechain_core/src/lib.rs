use std::{future::Future, pin::Pin};

pub mod context;
pub mod error;
pub mod upstream;
pub mod json;
pub mod model;
pub mod token;
pub mod tool;

pub use context::*;
pub use error::*;
pub use upstream::*;
pub use json::*;
pub use model::*;
pub use token::*;
pub use tool::*;

pub use tokio_util::sync::CancellationToken;

/// A type alias for a boxed error that is thread-safe and sendable across threads.
/// Used by startup code (configuration, wiring) where the error is reported, not matched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A type alias for a boxed future that is thread-safe and sendable across threads.
pub type BoxPinFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;

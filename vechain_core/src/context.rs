//! Execution context handed to every capability invocation.
//!
//! A context is created per call by the dispatch façade. It carries the call's
//! cancellation token, a clock, and the [`HttpFeatures`] used to reach upstream APIs.
//! Capabilities hold no other shared state.

use crate::{CancellationToken, HttpFeatures};

pub trait BaseContext: HttpFeatures + Clone + Send + Sync + 'static {
    /// Name of the capability this context was created for
    fn capability_name(&self) -> &str;

    /// Token cancelled when the caller abandons the invocation
    fn cancellation_token(&self) -> CancellationToken;

    /// Current unix time in milliseconds, used for result provenance
    fn unix_ms(&self) -> u64;
}

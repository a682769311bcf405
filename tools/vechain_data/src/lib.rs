//! Read capabilities for VeChain agents.
//!
//! Each upstream gets a client struct that owns its base URL and credentials, and
//! exposes its tools through `capabilities()`. Upstream payloads are normalized into
//! typed outputs; envelope differences stay in [`normalize`].

pub mod colend;
pub mod molten;
pub mod normalize;
pub mod vechainstats;
pub mod wanbridge;

pub use colend::*;
pub use molten::*;
pub use vechainstats::*;
pub use wanbridge::*;

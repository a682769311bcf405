//! Transaction Intent Builder for VeChain agents.
//!
//! Produces unsigned multi-clause transaction descriptors for an external wallet to
//! sign. Nothing here holds key material or broadcasts.

pub mod abi;
pub mod builder;
pub mod capability;
pub mod descriptor;
pub mod stargate;
pub mod thor;
pub mod tokens;
pub mod units;

pub use builder::*;
pub use capability::*;
pub use descriptor::*;
pub use stargate::*;
pub use thor::*;
pub use tokens::*;
pub use units::*;

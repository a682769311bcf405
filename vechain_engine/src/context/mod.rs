mod base;
pub mod mock;

pub use base::*;

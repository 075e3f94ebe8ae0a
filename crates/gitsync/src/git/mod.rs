//! Remote access layer: bounded git subprocess invocation and the thin
//! operation wrappers built on it.

pub mod exec;
pub(crate) mod ops;
pub(crate) mod parse;

pub use exec::{CancelHandle, OpContext};

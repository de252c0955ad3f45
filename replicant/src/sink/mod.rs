//! Delivery targets for change records.

mod base;
pub mod http;
pub mod memory;
pub mod stdout;

pub use base::{Sink, build_sinks};

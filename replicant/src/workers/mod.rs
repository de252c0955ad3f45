//! The four tasks of a streaming pipeline.
//!
//! Records flow consume → filter → fanout through bounded queues. The heartbeat worker only
//! requests acknowledgements, which the consume worker sends since it owns the session.

pub mod base;
pub mod consume;
pub mod fanout;
pub mod filter;
pub mod heartbeat;

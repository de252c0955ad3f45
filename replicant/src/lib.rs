//! Change data capture from Postgres logical replication.
//!
//! A [`pipeline::Replicant`] owns a replication slot decoded by `wal2json`. Each payload is turned
//! into a batch of [`types::ChangeRecord`]s, partition tables are remapped to their parent by the
//! [`filter::FilterStage`], an optional allow-list drops unwanted tables, and the remaining records
//! are written to every configured [`sink::Sink`] in the order they were read.
//!
//! Four tasks run while streaming: the consume worker reads the stream, the heartbeat worker asks
//! for periodic acknowledgements, and the filter and fanout workers process their queues. Queues
//! are bounded, so a slow sink eventually slows down reading from the source.

#[macro_use]
mod macros;

pub mod catalog;
pub mod concurrency;
pub mod decoding;
pub mod encryption;
pub mod error;
pub mod fanout;
pub mod filter;
pub mod pipeline;
pub mod replication;
pub mod sink;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;

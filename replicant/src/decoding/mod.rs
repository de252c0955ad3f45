//! Turns replication payloads into change batches.
//!
//! The pipeline only sees a [`DecodeFn`], so other decoding plugins can be supported by passing a
//! different function.

pub mod wal2json;

use std::sync::Arc;

use crate::error::ReplicantResult;
use crate::types::ChangeBatch;

/// Decodes one replication payload into its change records.
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> ReplicantResult<ChangeBatch> + Send + Sync>;

/// Returns the decoder for the `wal2json` output plugin.
pub fn wal2json_decoder() -> DecodeFn {
    Arc::new(wal2json::decode)
}

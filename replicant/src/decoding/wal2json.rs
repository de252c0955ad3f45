use serde::Deserialize;

use crate::bail;
use crate::error::{ErrorKind, ReplicantResult};
use crate::replicant_error;
use crate::types::ChangeBatch;

#[derive(Debug, Deserialize)]
struct Transaction {
    #[serde(rename = "change", alias = "Change", default)]
    change: ChangeBatch,
}

/// Decodes a `wal2json` (format version 1) transaction document.
///
/// Fails with [`ErrorKind::DecodingFailed`] when the payload is not valid JSON of the expected
/// shape or when a record carries column vectors of different lengths.
pub fn decode(payload: &[u8]) -> ReplicantResult<ChangeBatch> {
    let transaction: Transaction = serde_json::from_slice(payload).map_err(|err| {
        let detail = err.to_string();
        replicant_error!(
            ErrorKind::DecodingFailed,
            "Replication payload is not a valid wal2json document",
            detail = detail,
            source: err
        )
    })?;

    if let Some(record) = transaction
        .change
        .iter()
        .find(|record| !record.has_parallel_columns())
    {
        bail!(
            ErrorKind::DecodingFailed,
            "Change record has columns of different lengths",
            detail = format!(
                "{}.{} has {} names, {} types and {} values",
                record.schema,
                record.table,
                record.column_names.len(),
                record.column_types.len(),
                record.column_values.len()
            )
        );
    }

    Ok(transaction.change)
}

/// Returns at most `max_len` bytes of `payload` as lossy UTF-8 for logging.
pub fn payload_snippet(payload: &[u8], max_len: usize) -> String {
    let end = payload.len().min(max_len);
    let mut snippet = String::from_utf8_lossy(&payload[..end]).into_owned();
    if payload.len() > max_len {
        snippet.push_str("...");
    }
    snippet
}

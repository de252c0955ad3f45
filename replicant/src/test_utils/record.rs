use bytes::Bytes;
use serde_json::{Value, json};

use crate::types::ChangeRecord;

/// A record of `schema.table` with a single `id int4` column.
pub fn record(schema: &str, table: &str, id: i64) -> ChangeRecord {
    ChangeRecord {
        schema: schema.to_string(),
        table: table.to_string(),
        column_names: vec!["id".to_string()],
        column_types: vec!["int4".to_string()],
        column_values: vec![json!(id)],
    }
}

/// A record with arbitrary columns given as `(name, type, value)`.
pub fn record_with_columns(
    schema: &str,
    table: &str,
    columns: &[(&str, &str, Value)],
) -> ChangeRecord {
    ChangeRecord {
        schema: schema.to_string(),
        table: table.to_string(),
        column_names: columns.iter().map(|(name, _, _)| name.to_string()).collect(),
        column_types: columns.iter().map(|(_, ty, _)| ty.to_string()).collect(),
        column_values: columns.iter().map(|(_, _, value)| value.clone()).collect(),
    }
}

/// Encodes records the way the `wal2json` plugin emits one transaction.
pub fn wal2json_payload(records: &[ChangeRecord]) -> Bytes {
    let changes: Vec<Value> = records
        .iter()
        .map(|record| {
            json!({
                "kind": "insert",
                "schema": record.schema,
                "table": record.table,
                "columnnames": record.column_names,
                "columntypes": record.column_types,
                "columnvalues": record.column_values,
            })
        })
        .collect();

    Bytes::from(json!({ "change": changes }).to_string())
}

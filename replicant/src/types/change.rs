use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::TableName;

/// One row-level change, as emitted by the decoding plugin and delivered to sinks.
///
/// The three column vectors are parallel. Serialized field names follow the decoding plugin
/// payload, with the first letter upper cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "Schema", alias = "schema")]
    pub schema: String,
    #[serde(rename = "Table", alias = "table")]
    pub table: String,
    #[serde(rename = "Columnnames", alias = "columnnames", default)]
    pub column_names: Vec<String>,
    #[serde(rename = "Columntypes", alias = "columntypes", default)]
    pub column_types: Vec<String>,
    #[serde(rename = "Columnvalues", alias = "columnvalues", default)]
    pub column_values: Vec<serde_json::Value>,
}

impl ChangeRecord {
    pub fn table_name(&self) -> TableName {
        TableName::new(self.schema.clone(), self.table.clone())
    }

    /// Replaces the source table with `table`.
    pub fn rename(&mut self, table: &TableName) {
        self.schema.clone_from(&table.schema);
        self.table.clone_from(&table.name);
    }

    /// Returns true when the column vectors have equal lengths.
    pub fn has_parallel_columns(&self) -> bool {
        self.column_names.len() == self.column_types.len()
            && self.column_names.len() == self.column_values.len()
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {{", self.schema, self.table)?;
        let columns = self
            .column_names
            .iter()
            .zip(&self.column_types)
            .zip(&self.column_values);
        for (index, ((name, typ), value)) in columns.enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, " {name} {typ} = {value}")?;
        }
        f.write_str(" }")
    }
}

/// The records decoded from a single replication message, in statement order.
pub type ChangeBatch = Vec<ChangeRecord>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record() -> ChangeRecord {
        ChangeRecord {
            schema: "public".to_string(),
            table: "users".to_string(),
            column_names: vec!["id".to_string(), "name".to_string()],
            column_types: vec!["int4".to_string(), "text".to_string()],
            column_values: vec![json!(1), json!(null)],
        }
    }

    #[test]
    fn serializes_with_capitalized_field_names() {
        let value = serde_json::to_value(record()).unwrap();

        assert_eq!(
            value,
            json!({
                "Schema": "public",
                "Table": "users",
                "Columnnames": ["id", "name"],
                "Columntypes": ["int4", "text"],
                "Columnvalues": [1, null],
            })
        );
    }

    #[test]
    fn deserializes_lowercase_fields_and_missing_columns() {
        let record: ChangeRecord =
            serde_json::from_value(json!({ "kind": "delete", "schema": "public", "table": "users" }))
                .unwrap();

        assert_eq!(record.table_name(), TableName::new("public", "users"));
        assert!(record.column_names.is_empty());
        assert!(record.has_parallel_columns());
    }

    #[test]
    fn rename_rewrites_schema_and_table() {
        let mut record = record();
        record.rename(&TableName::new("sales", "orders"));

        assert_eq!(record.schema, "sales");
        assert_eq!(record.table, "orders");
        assert_eq!(record.column_names.len(), 2);
    }

    #[test]
    fn display_lists_columns() {
        assert_eq!(
            record().to_string(),
            "public.users { id int4 = 1, name text = null }"
        );
    }
}

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::types::TableName;

#[derive(Debug, Deserialize)]
struct AllowedTable {
    #[serde(rename = "Schema", alias = "schema")]
    schema: String,
    #[serde(rename = "Table", alias = "table")]
    table: String,
}

/// Set of logical tables whose changes are forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    tables: HashSet<TableName>,
}

impl AllowList {
    pub fn new(tables: impl IntoIterator<Item = TableName>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
        }
    }

    /// Reads the allow-list from a JSON array of `{"Schema": .., "Table": ..}` objects.
    ///
    /// Returns `None`, meaning every table passes, when the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %path.display(), "allow-list not loaded, all tables pass: {}", err);
                return None;
            }
        };

        match Self::parse(&contents) {
            Ok(allow_list) => {
                info!(path = %path.display(), tables = allow_list.len(), "allow-list loaded");
                Some(allow_list)
            }
            Err(err) => {
                warn!(path = %path.display(), "allow-list is malformed, all tables pass: {}", err);
                None
            }
        }
    }

    fn parse(contents: &[u8]) -> Result<Self, serde_json::Error> {
        let tables: Vec<AllowedTable> = serde_json::from_slice(contents)?;

        Ok(Self::new(
            tables
                .into_iter()
                .map(|allowed| TableName::new(allowed.schema, allowed.table)),
        ))
    }

    pub fn contains(&self, table: &TableName) -> bool {
        self.tables.contains(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

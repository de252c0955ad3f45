use std::collections::HashMap;

use tracing::warn;

use crate::error::{ErrorKind, ReplicantResult};
use crate::replicant_error;
use crate::replication::TableMappingEntry;
use crate::types::TableName;

/// Maps every known table to its logical parent. Tables without a parent map to themselves.
///
/// Built once at startup and never refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMapping {
    parents: HashMap<TableName, TableName>,
}

impl TableMapping {
    /// Builds the mapping from catalog rows.
    ///
    /// A table listed with several parents keeps the smallest one, ordered by schema then name.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = TableMappingEntry>,
    {
        let mut candidates: HashMap<TableName, Vec<TableName>> = HashMap::new();
        for entry in entries {
            candidates.entry(entry.child).or_default().push(entry.parent);
        }

        let mut parents = HashMap::with_capacity(candidates.len());
        for (child, mut child_parents) in candidates {
            child_parents.sort();
            child_parents.dedup();

            let mut child_parents = child_parents.into_iter();
            let Some(parent) = child_parents.next() else {
                continue;
            };

            let ignored: Vec<String> = child_parents.map(|table| table.to_string()).collect();
            if !ignored.is_empty() {
                warn!(
                    table = %child,
                    parent = %parent,
                    ignored = ?ignored,
                    "table has several parents, using the first one"
                );
            }

            parents.insert(child, parent);
        }

        Self { parents }
    }

    /// Returns the logical parent of `table`, or `None` if the table is unknown.
    pub fn resolve(&self, table: &TableName) -> Option<&TableName> {
        self.parents.get(table)
    }

    /// Like [`TableMapping::resolve`], failing with [`ErrorKind::MissingTableMapping`].
    pub fn parent_of(&self, table: &TableName) -> ReplicantResult<&TableName> {
        self.resolve(table).ok_or_else(|| {
            replicant_error!(
                ErrorKind::MissingTableMapping,
                "Table not found in table mapping",
                format!("Can't find table {table} in table map")
            )
        })
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl FromIterator<(TableName, TableName)> for TableMapping {
    fn from_iter<T: IntoIterator<Item = (TableName, TableName)>>(iter: T) -> Self {
        Self::from_entries(
            iter.into_iter()
                .map(|(child, parent)| TableMappingEntry { child, parent }),
        )
    }
}

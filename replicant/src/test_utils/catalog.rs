use crate::catalog::TableCatalog;
use crate::error::{ErrorKind, ReplicantResult};
use crate::filter::TableMapping;
use crate::types::TableName;
use crate::bail;

/// [`TableCatalog`] returning a fixed mapping.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    mapping: TableMapping,
    fail: bool,
}

impl MemoryCatalog {
    pub fn new(mapping: TableMapping) -> Self {
        Self {
            mapping,
            fail: false,
        }
    }

    /// Maps each `(child, parent)` pair given as `("schema.table", "schema.table")`.
    pub fn from_pairs(pairs: &[((&str, &str), (&str, &str))]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|((schema, table), (parent_schema, parent_table))| {
                    (
                        TableName::new(*schema, *table),
                        TableName::new(*parent_schema, *parent_table),
                    )
                })
                .collect(),
        )
    }

    /// A catalog whose queries always fail.
    pub fn failing() -> Self {
        Self {
            mapping: TableMapping::default(),
            fail: true,
        }
    }
}

impl TableCatalog for MemoryCatalog {
    async fn load_table_mapping(&self) -> ReplicantResult<TableMapping> {
        if self.fail {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Table mapping query failed",
                "The in-memory catalog is configured to fail"
            );
        }

        Ok(self.mapping.clone())
    }
}

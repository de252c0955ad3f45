use std::future::Future;

use crate::error::ReplicantResult;
use crate::filter::TableMapping;

/// Source of the child to parent table mapping.
pub trait TableCatalog {
    /// Loads the mapping of every known table to its logical parent.
    fn load_table_mapping(&self) -> impl Future<Output = ReplicantResult<TableMapping>> + Send;
}

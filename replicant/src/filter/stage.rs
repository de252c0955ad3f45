use tracing::{debug, error};

use crate::filter::{AllowList, TableMapping};
use crate::types::{ChangeBatch, ChangeRecord};

/// What happened to a record passed through [`FilterStage::filter_record`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// The record was renamed to its parent table and must be delivered.
    Forward(ChangeRecord),
    /// The parent table is not in the allow-list.
    Dropped,
    /// The table is missing from the table mapping.
    Unmapped,
}

/// Renames records to their logical parent table and applies the allow-list.
#[derive(Debug, Clone)]
pub struct FilterStage {
    mapping: TableMapping,
    allow_list: Option<AllowList>,
}

impl FilterStage {
    /// Creates the stage. A `None` allow-list lets every mapped table through.
    pub fn new(mapping: TableMapping, allow_list: Option<AllowList>) -> Self {
        Self {
            mapping,
            allow_list,
        }
    }

    pub fn filter_record(&self, mut record: ChangeRecord) -> FilterOutcome {
        let table = record.table_name();
        let parent = match self.mapping.parent_of(&table) {
            Ok(parent) => parent,
            Err(err) => {
                error!(table = %table, "{}", err);
                return FilterOutcome::Unmapped;
            }
        };

        if let Some(allow_list) = &self.allow_list
            && !allow_list.contains(parent)
        {
            debug!(table = %table, parent = %parent, "record filtered out");
            return FilterOutcome::Dropped;
        }

        record.rename(parent);
        FilterOutcome::Forward(record)
    }

    /// Filters a batch, keeping the order of the forwarded records.
    pub fn filter_batch(&self, batch: ChangeBatch) -> Vec<ChangeRecord> {
        batch
            .into_iter()
            .filter_map(|record| match self.filter_record(record) {
                FilterOutcome::Forward(record) => Some(record),
                FilterOutcome::Dropped | FilterOutcome::Unmapped => None,
            })
            .collect()
    }
}

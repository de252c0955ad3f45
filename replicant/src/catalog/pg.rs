use config::shared::PgConnectionConfig;
use tracing::info;

use crate::catalog::TableCatalog;
use crate::error::ReplicantResult;
use crate::filter::TableMapping;
use crate::replication::PgReplicationClient;

/// [`TableCatalog`] reading `pg_class` and `pg_inherits` of the source database.
#[derive(Debug, Clone)]
pub struct PgTableCatalog {
    config: PgConnectionConfig,
}

impl PgTableCatalog {
    pub fn new(config: PgConnectionConfig) -> Self {
        Self { config }
    }
}

impl TableCatalog for PgTableCatalog {
    async fn load_table_mapping(&self) -> ReplicantResult<TableMapping> {
        let client = PgReplicationClient::connect(&self.config).await?;
        let entries = client.load_table_mapping_entries().await?;

        let mapping = TableMapping::from_entries(entries);
        info!(tables = mapping.len(), "table mapping loaded");

        Ok(mapping)
    }
}

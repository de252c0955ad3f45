use std::fmt;
use std::io::BufReader;
use std::sync::Arc;

use config::shared::{IntoConnectOptions, PgConnectionConfig};
use pg_escape::{quote_identifier, quote_literal};
use postgres::types::TableName;
use rustls::ClientConfig;
use tokio_postgres::error::SqlState;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{
    Client, Config, Connection, NoTls, SimpleQueryMessage, SimpleQueryRow, Socket,
    config::ReplicationMode,
};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, error, info, warn};

use crate::encryption::install_crypto_provider;
use crate::error::{ErrorKind, ReplicantResult};
use crate::replication::stream::WalStream;
use crate::types::Position;
use crate::{bail, replicant_error};

/// Lists every ordinary or partitioned user table together with its direct parent, if any.
///
/// Tables without a parent map to themselves. Rows are ordered by child then parent.
const TABLE_MAPPING_QUERY: &str = r#"
select
    child_ns.nspname as child_schema,
    child.relname as child_table,
    coalesce(parent_ns.nspname, child_ns.nspname) as parent_schema,
    coalesce(parent.relname, child.relname) as parent_table
from pg_class child
join pg_namespace child_ns on child_ns.oid = child.relnamespace
left join pg_inherits inh on inh.inhrelid = child.oid
left join pg_class parent on parent.oid = inh.inhparent
left join pg_namespace parent_ns on parent_ns.oid = parent.relnamespace
where child.relkind in ('r', 'p')
  and child_ns.nspname not in ('information_schema', 'pg_catalog')
order by 1, 2, 3, 4;
"#;

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The connection ends on its own once the `Client` is dropped.
    tokio::spawn(task);
}

/// A row of the table mapping query: a table and its logical parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMappingEntry {
    pub child: TableName,
    pub parent: TableName,
}

/// A connection to Postgres in logical replication mode.
#[derive(Debug, Clone)]
pub struct PgReplicationClient {
    client: Arc<Client>,
}

impl PgReplicationClient {
    /// Connects to the source database, using TLS when it's enabled in the config.
    pub async fn connect(pg_connection_config: &PgConnectionConfig) -> ReplicantResult<Self> {
        let mut config: Config = pg_connection_config.with_db();
        config.replication_mode(ReplicationMode::Logical);

        let connect_result = if pg_connection_config.tls.enabled {
            Self::connect_tls(config, &pg_connection_config.tls.trusted_root_certs).await
        } else {
            Self::connect_no_tls(config).await
        };

        if let Err(err) = &connect_result {
            error!(
                host = %pg_connection_config.host,
                port = pg_connection_config.port,
                database = %pg_connection_config.name,
                "failed to connect to the source database: {}",
                err
            );
        }

        connect_result
    }

    async fn connect_no_tls(config: Config) -> ReplicantResult<Self> {
        let (client, connection) = config.connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        info!("successfully connected to postgres without tls");

        Ok(PgReplicationClient {
            client: Arc::new(client),
        })
    }

    async fn connect_tls(config: Config, trusted_root_certs: &str) -> ReplicantResult<Self> {
        install_crypto_provider();

        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader = BufReader::new(trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            root_store.add(cert?)?;
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
        spawn_postgres_connection::<MakeRustlsConnect>(connection);

        info!("successfully connected to postgres with tls");

        Ok(PgReplicationClient {
            client: Arc::new(client),
        })
    }

    /// Returns whether a replication slot named `slot_name` exists.
    pub async fn slot_exists(&self, slot_name: &str) -> ReplicantResult<bool> {
        let query = format!(
            r#"select 1 as found from pg_replication_slots where slot_name = {};"#,
            quote_literal(slot_name)
        );

        let results = self.client.simple_query(&query).await?;
        let exists = results
            .iter()
            .any(|message| matches!(message, SimpleQueryMessage::Row(_)));

        Ok(exists)
    }

    /// Creates a logical slot bound to `output_plugin` and returns its consistent point as text.
    pub async fn create_slot(&self, slot_name: &str, output_plugin: &str) -> ReplicantResult<String> {
        // Replication commands must stay upper case, the replication lexer does not accept
        // lower case keywords.
        let query = format!(
            r#"CREATE_REPLICATION_SLOT {} LOGICAL {} NOEXPORT_SNAPSHOT"#,
            quote_identifier(slot_name),
            quote_identifier(output_plugin)
        );

        let results = match self.client.simple_query(&query).await {
            Ok(results) => results,
            Err(err) => {
                if let Some(code) = err.code()
                    && *code == SqlState::DUPLICATE_OBJECT
                {
                    bail!(
                        ErrorKind::ReplicationSlotAlreadyExists,
                        "Replication slot already exists",
                        format!("Replication slot '{slot_name}' already exists in database")
                    );
                }

                bail!(
                    ErrorKind::ReplicationSlotNotCreated,
                    "Replication slot creation failed",
                    format!("Replication slot '{slot_name}' could not be created: {err}"),
                    source: err
                );
            }
        };

        for result in results {
            if let SimpleQueryMessage::Row(row) = result {
                return Self::get_row_value(&row, "consistent_point", "CREATE_REPLICATION_SLOT");
            }
        }

        bail!(
            ErrorKind::ReplicationSlotNotCreated,
            "Replication slot creation failed",
            format!("Server returned no row when creating slot '{slot_name}'")
        );
    }

    /// Drops the slot, waiting for it to become inactive first.
    pub async fn delete_slot(&self, slot_name: &str) -> ReplicantResult<()> {
        info!("deleting replication slot '{}'", slot_name);
        let query = format!(
            r#"DROP_REPLICATION_SLOT {} WAIT;"#,
            quote_identifier(slot_name)
        );

        match self.client.simple_query(&query).await {
            Ok(_) => {
                info!("successfully deleted replication slot '{}'", slot_name);

                Ok(())
            }
            Err(err) => {
                if let Some(code) = err.code()
                    && *code == SqlState::UNDEFINED_OBJECT
                {
                    warn!(
                        "attempted to delete non-existent replication slot '{}'",
                        slot_name
                    );

                    bail!(
                        ErrorKind::ReplicationSlotNotFound,
                        "Replication slot not found",
                        format!("Replication slot '{slot_name}' not found while deleting it")
                    );
                }

                bail!(
                    ErrorKind::ReplicationSlotDropFailed,
                    "Replication slot deletion failed",
                    format!("Replication slot '{slot_name}' could not be deleted: {err}"),
                    source: err
                );
            }
        }
    }

    /// Starts streaming changes of `slot_name` from `start`.
    pub async fn start_replication(
        &self,
        slot_name: &str,
        start: Position,
    ) -> ReplicantResult<WalStream> {
        info!(
            "starting logical replication with slot named '{}' at position {}",
            slot_name, start
        );

        let query = format!(
            r#"START_REPLICATION SLOT {} LOGICAL {}"#,
            quote_identifier(slot_name),
            start
        );

        let copy_stream = self
            .client
            .copy_both_simple::<bytes::Bytes>(&query)
            .await
            .map_err(|err| {
                replicant_error!(
                    ErrorKind::ReplicationStartFailed,
                    "Failed to start logical replication",
                    detail = format!("Slot '{slot_name}' at {start}: {err}"),
                    source: err
                )
            })?;

        Ok(WalStream::wrap(copy_stream))
    }

    /// Loads every user table together with its parent table.
    pub async fn load_table_mapping_entries(&self) -> ReplicantResult<Vec<TableMappingEntry>> {
        let results = self.client.simple_query(TABLE_MAPPING_QUERY).await?;

        let mut entries = Vec::new();
        for result in results {
            if let SimpleQueryMessage::Row(row) = result {
                let child_schema: String = Self::get_row_value(&row, "child_schema", "pg_class")?;
                let child_table: String = Self::get_row_value(&row, "child_table", "pg_class")?;
                let parent_schema: String =
                    Self::get_row_value(&row, "parent_schema", "pg_inherits")?;
                let parent_table: String =
                    Self::get_row_value(&row, "parent_table", "pg_inherits")?;

                entries.push(TableMappingEntry {
                    child: TableName::new(child_schema, child_table),
                    parent: TableName::new(parent_schema, parent_table),
                });
            }
        }

        Ok(entries)
    }

    /// Extracts and parses a column of a simple query row.
    fn get_row_value<T: std::str::FromStr>(
        row: &SimpleQueryRow,
        column_name: &str,
        source_name: &str,
    ) -> ReplicantResult<T>
    where
        T::Err: fmt::Debug,
    {
        let value = row.try_get(column_name)?.ok_or_else(|| {
            replicant_error!(
                ErrorKind::SourceQueryFailed,
                "Column not found in query result",
                format!("Column '{column_name}' missing from '{source_name}' result")
            )
        })?;

        value.parse().map_err(|e: T::Err| {
            replicant_error!(
                ErrorKind::SourceQueryFailed,
                "Column parsing failed",
                format!(
                    "Failed to parse value from column '{column_name}' of '{source_name}': {e:?}"
                )
            )
        })
    }
}

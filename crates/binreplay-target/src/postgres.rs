use std::future::Future;

use binreplay_core::{Column, TableSchema};
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::{info, warn};

use crate::client::TargetDatabase;
use crate::connect::connect_postgres;
use crate::error::{TargetError, TargetResult};

const TABLE_COLUMNS: &str = "SELECT column_name::text, data_type::text, is_nullable::text
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position";

/// Postgres target. Source databases map onto Postgres schemas.
///
/// Requests are sent with the simple query protocol so a whole transaction
/// travels in one round trip. The session is reconnected lazily when the
/// previous connection was closed.
pub struct PostgresTarget {
    connection_string: String,
    client: Mutex<Option<Client>>,
}

impl PostgresTarget {
    pub async fn connect(connection_string: impl Into<String>) -> TargetResult<Self> {
        let connection_string = connection_string.into();
        let client = connect_postgres(&connection_string).await?;
        info!("Connected to target database");

        Ok(Self {
            connection_string,
            client: Mutex::new(Some(client)),
        })
    }
}

async fn live_client<'a>(
    slot: &'a mut Option<Client>,
    connection_string: &str,
) -> TargetResult<&'a Client> {
    if slot.as_ref().map_or(true, Client::is_closed) {
        warn!("Target connection is closed, reconnecting");
        *slot = Some(connect_postgres(connection_string).await?);
    }
    slot.as_ref().ok_or(TargetError::Closed)
}

impl TargetDatabase for PostgresTarget {
    fn execute(&self, query: String) -> impl Future<Output = TargetResult<()>> + Send {
        async move {
            let mut slot = self.client.lock().await;
            let client = live_client(&mut slot, &self.connection_string).await?;

            if let Err(e) = client.batch_execute(&query).await {
                // A failure after BEGIN leaves the session in an aborted
                // transaction until it is rolled back.
                if !client.is_closed() {
                    if let Err(rollback) = client.batch_execute("ROLLBACK").await {
                        warn!(error = %rollback, "Failed to roll back target transaction");
                    }
                }
                return Err(e.into());
            }

            Ok(())
        }
    }

    fn load_table_schema(
        &self,
        database: String,
        table: String,
    ) -> impl Future<Output = TargetResult<Option<TableSchema>>> + Send {
        async move {
            let mut slot = self.client.lock().await;
            let client = live_client(&mut slot, &self.connection_string).await?;

            let rows = client.query(TABLE_COLUMNS, &[&database, &table]).await?;
            if rows.is_empty() {
                return Ok(None);
            }

            let columns = rows
                .iter()
                .map(|row| {
                    let column = Column::new(row.get::<_, String>(0), row.get::<_, String>(1));
                    if row.get::<_, String>(2) == "NO" {
                        column.not_null()
                    } else {
                        column
                    }
                })
                .collect();

            Ok(Some(TableSchema::new(columns)))
        }
    }
}

//! Postgres connection setup with TLS support.

use std::future::Future;
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_postgres::{Client, NoTls};
use tokio_postgres_rustls_improved::MakeRustlsConnect;
use tracing::{debug, error};

use crate::error::{TargetError, TargetResult};

/// Connect to the target, using TLS when the connection string's sslmode
/// demands it. The connection task is spawned; only the client is returned.
pub async fn connect_postgres(connection_string: &str) -> TargetResult<Client> {
    if requires_tls(connection_string) {
        debug!("Connecting to target with TLS");
        let (client, connection) =
            tokio_postgres::connect(connection_string, MakeRustlsConnect::new(tls_config()?))
                .await
                .map_err(|e| TargetError::Connection(e.to_string()))?;
        drive(connection);
        Ok(client)
    } else {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| TargetError::Connection(e.to_string()))?;
        drive(connection);
        Ok(client)
    }
}

fn drive<F>(connection: F)
where
    F: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "Target connection closed with error");
        }
    });
}

fn tls_config() -> TargetResult<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| TargetError::Connection(format!("TLS config error: {}", e)))?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(config)
}

/// sslmode values that refuse a plaintext connection.
fn requires_tls(connection_string: &str) -> bool {
    connection_string
        .split(|c: char| c == '?' || c == '&' || c.is_whitespace())
        .filter_map(|part| part.strip_prefix("sslmode="))
        .any(|mode| matches!(mode, "require" | "verify-ca" | "verify-full"))
}

//! Ad-hoc statements against the replica.

use replica_core::ReplicaConfig;

use crate::driver::{ReplicaDriver, Rows, SqlValue};
use crate::error::SyncError;

/// Run `sql` on a fresh connection, then sync so local writes reach the
/// remote. The connection is released before returning.
///
/// A failed sync after a successful statement is reported as an error: the
/// statement ran locally, but the caller cannot assume it was replicated.
pub async fn execute_query(
    driver: &dyn ReplicaDriver,
    config: &ReplicaConfig,
    sql: &str,
    params: Vec<SqlValue>,
) -> Result<Rows, SyncError> {
    let mut conn = driver.connect(config).await?;
    let rows = conn.query(sql, params).await.inspect_err(|err| {
        tracing::error!(error = %err, "error executing query");
    })?;
    conn.sync().await?;
    conn.close();

    let preview: String = sql.chars().take(50).collect();
    tracing::debug!(sql = %preview, rows = rows.len(), "query executed and synced");
    Ok(rows)
}

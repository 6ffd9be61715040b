//! libSQL embedded-replica driver.
//!
//! Each connection opens the local replica file bound to the remote
//! endpoint; the `Database` handle lives alongside the `Connection` because
//! sync is a database-level operation in libSQL.

use async_trait::async_trait;
use libsql::params::Params;
use libsql::{Builder, Connection, Database, Value};

use replica_core::ReplicaConfig;

use crate::driver::{ReplicaConnection, ReplicaDriver, Rows, SqlValue};
use crate::error::SyncError;

/// Production driver backed by `libsql` remote replicas.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibsqlDriver;

impl LibsqlDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReplicaDriver for LibsqlDriver {
    async fn connect(
        &self,
        config: &ReplicaConfig,
    ) -> Result<Box<dyn ReplicaConnection>, SyncError> {
        if let Some(dir) = config.db_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|err| {
                    SyncError::Connection(format!("cannot create {}: {err}", dir.display()))
                })?;
            }
        }

        let db = Builder::new_remote_replica(
            &config.db_path,
            config.sync_url.clone(),
            config.auth_token.clone(),
        )
        .build()
        .await
        .map_err(|err| SyncError::Connection(err.to_string()))?;
        let conn = db
            .connect()
            .map_err(|err| SyncError::Connection(err.to_string()))?;

        tracing::debug!(path = %config.db_path.display(), "opened libsql replica");
        Ok(Box::new(LibsqlConnection { db, conn }))
    }
}

struct LibsqlConnection {
    db: Database,
    conn: Connection,
}

#[async_trait]
impl ReplicaConnection for LibsqlConnection {
    async fn sync(&mut self) -> Result<(), SyncError> {
        self.db
            .sync()
            .await
            .map(|_| ())
            .map_err(|err| SyncError::Sync(err.to_string()))
    }

    async fn query(&mut self, sql: &str, params: Vec<SqlValue>) -> Result<Rows, SyncError> {
        let mut rows = self
            .conn
            .query(sql, to_params(params))
            .await
            .map_err(|err| SyncError::Query(err.to_string()))?;

        let mut collected = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|err| SyncError::Query(err.to_string()))?
        {
            let mut values = Vec::new();
            for idx in 0..row.column_count() {
                let value = row
                    .get_value(idx)
                    .map_err(|err| SyncError::Query(err.to_string()))?;
                values.push(from_value(value));
            }
            collected.push(values);
        }
        Ok(collected)
    }

    async fn execute(&mut self, sql: &str, params: Vec<SqlValue>) -> Result<u64, SyncError> {
        self.conn
            .execute(sql, to_params(params))
            .await
            .map_err(|err| SyncError::Query(err.to_string()))
    }
}

fn to_params(params: Vec<SqlValue>) -> Params {
    if params.is_empty() {
        return Params::None;
    }
    Params::Positional(params.into_iter().map(into_value).collect())
}

fn into_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(v),
        SqlValue::Real(v) => Value::Real(v),
        SqlValue::Text(v) => Value::Text(v),
        SqlValue::Blob(v) => Value::Blob(v),
    }
}

fn from_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(v),
        Value::Real(v) => SqlValue::Real(v),
        Value::Text(v) => SqlValue::Text(v),
        Value::Blob(v) => SqlValue::Blob(v),
    }
}

//! Replica configuration.
//!
//! # Sources
//!
//! ```text
//! ~/.replica/config.yaml   (optional)
//! TURSO_* / REPLICA_* env  (override the file, field by field)
//! ```
//!
//! Every loader has an `_at(home, …)` form taking an explicit home directory
//! and environment lookup; tests use those and never the no-arg wrapper.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 1_000;

pub const ENV_DB_PATH: &str = "TURSO_DB_PATH";
pub const ENV_SYNC_URL: &str = "TURSO_SYNC_URL";
pub const ENV_AUTH_TOKEN: &str = "TURSO_AUTH_TOKEN";
pub const ENV_DB_NAME: &str = "TURSO_DB_NAME";
pub const ENV_SYNC_INTERVAL: &str = "REPLICA_SYNC_INTERVAL";
pub const ENV_SYNC_TIMEOUT: &str = "REPLICA_SYNC_TIMEOUT";
pub const ENV_STARTUP_DELAY_MS: &str = "REPLICA_STARTUP_DELAY_MS";

const URL_SCHEMES: [&str; 5] = ["libsql://", "https://", "http://", "wss://", "ws://"];

/// Resolved, validated settings for one local replica.
#[derive(Clone, PartialEq, Eq)]
pub struct ReplicaConfig {
    /// Local database file backing the replica.
    pub db_path: PathBuf,
    /// Remote endpoint the replica syncs from.
    pub sync_url: String,
    /// Credential for the remote endpoint. Never printed.
    pub auth_token: String,
    /// Human-facing database identifier.
    pub db_name: String,
    pub sync_interval: Duration,
    /// Upper bound on one connect + sync attempt.
    pub sync_timeout: Duration,
    /// Settle delay between status seeding and starting the scheduler.
    pub startup_delay: Duration,
}

impl ReplicaConfig {
    /// Build a config directly, with default timings.
    pub fn new(
        db_path: impl Into<PathBuf>,
        sync_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        let sync_url = sync_url.into();
        Self {
            db_path: db_path.into(),
            db_name: derive_db_name(&sync_url),
            sync_url,
            auth_token: auth_token.into(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            sync_timeout: Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
            startup_delay: Duration::from_millis(DEFAULT_STARTUP_DELAY_MS),
        }
    }
}

impl fmt::Debug for ReplicaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaConfig")
            .field("db_path", &self.db_path)
            .field("sync_url", &self.sync_url)
            .field("auth_token", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("sync_interval", &self.sync_interval)
            .field("sync_timeout", &self.sync_timeout)
            .field("startup_delay", &self.startup_delay)
            .finish()
    }
}

/// On-disk shape; every field optional so env vars can fill gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    db_path: Option<PathBuf>,
    sync_url: Option<String>,
    auth_token: Option<String>,
    db_name: Option<String>,
    sync_interval_secs: Option<u64>,
    sync_timeout_secs: Option<u64>,
    startup_delay_ms: Option<u64>,
}

/// `<home>/.replica/` — pure, no I/O.
pub fn replica_root(home: &Path) -> PathBuf {
    home.join(".replica")
}

/// `<home>/.replica/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    replica_root(home).join("config.yaml")
}

/// Load config from `<home>/.replica/config.yaml` and the given env lookup.
pub fn load_at<F>(home: &Path, env: F) -> Result<ReplicaConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = config_path_at(home);
    let file = if path.exists() {
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|source| ConfigError::Parse { path, source })?
        }
    } else {
        ConfigFile::default()
    };
    resolve(file, env)
}

/// `load_at` convenience wrapper: real home directory and process env.
pub fn load() -> Result<ReplicaConfig, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    load_at(&home, |key| std::env::var(key).ok())
}

fn resolve<F>(file: ConfigFile, env: F) -> Result<ReplicaConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    let db_path = lookup(ENV_DB_PATH)
        .map(PathBuf::from)
        .or(file.db_path)
        .ok_or(ConfigError::Missing {
            field: "db_path",
            env: ENV_DB_PATH,
        })?;
    let sync_url = lookup(ENV_SYNC_URL)
        .or(file.sync_url)
        .ok_or(ConfigError::Missing {
            field: "sync_url",
            env: ENV_SYNC_URL,
        })?;
    let auth_token = lookup(ENV_AUTH_TOKEN)
        .or(file.auth_token)
        .ok_or(ConfigError::Missing {
            field: "auth_token",
            env: ENV_AUTH_TOKEN,
        })?;

    if !URL_SCHEMES.iter().any(|scheme| sync_url.starts_with(scheme)) {
        return Err(ConfigError::Invalid {
            field: "sync_url",
            reason: format!("expected one of {} but got '{sync_url}'", URL_SCHEMES.join(", ")),
        });
    }

    let db_name = lookup(ENV_DB_NAME)
        .or(file.db_name)
        .unwrap_or_else(|| derive_db_name(&sync_url));

    let interval_secs = numeric(
        lookup(ENV_SYNC_INTERVAL),
        file.sync_interval_secs,
        "sync_interval_secs",
        DEFAULT_SYNC_INTERVAL_SECS,
    )?;
    let timeout_secs = numeric(
        lookup(ENV_SYNC_TIMEOUT),
        file.sync_timeout_secs,
        "sync_timeout_secs",
        DEFAULT_SYNC_TIMEOUT_SECS,
    )?;
    let startup_delay_ms = numeric(
        lookup(ENV_STARTUP_DELAY_MS),
        file.startup_delay_ms,
        "startup_delay_ms",
        DEFAULT_STARTUP_DELAY_MS,
    )?;

    if interval_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "sync_interval_secs",
            reason: "must be greater than zero".to_string(),
        });
    }
    if timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "sync_timeout_secs",
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(ReplicaConfig {
        db_path,
        sync_url,
        auth_token,
        db_name,
        sync_interval: Duration::from_secs(interval_secs),
        sync_timeout: Duration::from_secs(timeout_secs),
        startup_delay: Duration::from_millis(startup_delay_ms),
    })
}

fn numeric(
    from_env: Option<String>,
    from_file: Option<u64>,
    field: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match from_env {
        Some(raw) => raw.trim().parse().map_err(|err| ConfigError::Invalid {
            field,
            reason: format!("'{raw}' is not a whole number: {err}"),
        }),
        None => Ok(from_file.unwrap_or(default)),
    }
}

/// First DNS label of the sync URL host, e.g. `libsql://mail-acme.turso.io`
/// gives `mail-acme`. IP hosts are returned whole.
pub fn derive_db_name(sync_url: &str) -> String {
    let rest = sync_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(sync_url);
    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    if host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }
    host.split('.').next().unwrap_or_default().to_string()
}

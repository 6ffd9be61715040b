//! `replica check` — sync status, forced sync and verification.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use replica_core::{ReplicaConfig, StatusStore, SyncStatus, VerificationReport};
use replica_daemon::paths::socket_path;
use replica_daemon::{
    request_force_sync, request_reset, request_sync_status, request_verify, send_request,
    DaemonError, DaemonRequest, ReplicaService,
};
use replica_sync::LibsqlDriver;

use super::{home_dir, load_config, local_runtime};

const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Arguments for `replica check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Run a sync now, before reporting.
    #[arg(long)]
    pub force_sync: bool,

    /// Test the connection, a query and a sync, then summarize.
    #[arg(long)]
    pub detailed: bool,

    /// Re-seed the sync status with a fresh attempt.
    #[arg(long)]
    pub reset_status: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = load_config(&home)?;
        let backend = Backend::detect(&home, config)?;

        let report = self.collect(&backend)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize check JSON")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }

    fn collect(&self, backend: &Backend) -> Result<CheckReport> {
        let reset = if self.reset_status {
            Some(backend.reset()?)
        } else {
            None
        };
        let forced = if self.force_sync {
            let (success, duration) = backend.force_sync()?;
            Some(ForcedSyncJson { success, duration })
        } else {
            None
        };
        let status = StatusJson::from(backend.status()?);
        let verification = if self.detailed {
            Some(VerificationJson::from(backend.verify()?))
        } else {
            None
        };

        Ok(CheckReport {
            source: backend.label(),
            reset,
            force_sync: forced,
            status,
            verification,
            connection: ConnectionJson::from(backend.config()),
        })
    }
}

/// Where operations run: a live daemon over its socket, or in this process.
enum Backend {
    Daemon {
        home: PathBuf,
        config: ReplicaConfig,
    },
    Local {
        runtime: tokio::runtime::Runtime,
        service: ReplicaService,
    },
}

impl Backend {
    fn detect(home: &Path, config: ReplicaConfig) -> Result<Self> {
        if socket_path(home).exists() {
            match send_request(home, &DaemonRequest::new("status")) {
                Ok(response) if response.ok => {
                    return Ok(Self::Daemon {
                        home: home.to_path_buf(),
                        config,
                    });
                }
                Ok(_) | Err(DaemonError::DaemonNotRunning { .. }) => {}
                Err(err) => return Err(err).context("failed to reach replica daemon"),
            }
        }

        let service = ReplicaService::new(Arc::new(LibsqlDriver::new()), config, StatusStore::new());
        Ok(Self::Local {
            runtime: local_runtime()?,
            service,
        })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Daemon { .. } => "daemon",
            Self::Local { .. } => "local",
        }
    }

    fn config(&self) -> &ReplicaConfig {
        match self {
            Self::Daemon { config, .. } => config,
            Self::Local { service, .. } => service.config(),
        }
    }

    fn reset(&self) -> Result<bool> {
        match self {
            Self::Daemon { home, .. } => request_reset(home).context("daemon reset failed"),
            Self::Local { runtime, service } => Ok(runtime.block_on(service.reset_status())),
        }
    }

    fn force_sync(&self) -> Result<(bool, f64)> {
        match self {
            Self::Daemon { home, .. } => {
                let outcome = request_force_sync(home).context("daemon sync failed")?;
                Ok((outcome.success, outcome.duration))
            }
            Self::Local { runtime, service } => Ok(runtime.block_on(service.force_sync())),
        }
    }

    fn status(&self) -> Result<SyncStatus> {
        match self {
            Self::Daemon { home, .. } => {
                request_sync_status(home).context("failed to query daemon status")
            }
            Self::Local { service, .. } => Ok(service.get_status()),
        }
    }

    fn verify(&self) -> Result<VerificationReport> {
        match self {
            Self::Daemon { home, .. } => request_verify(home).context("daemon verify failed"),
            Self::Local { runtime, service } => Ok(runtime.block_on(service.verify())),
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    force_sync: Option<ForcedSyncJson>,
    status: StatusJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<VerificationJson>,
    connection: ConnectionJson,
}

#[derive(Debug, Serialize)]
struct ForcedSyncJson {
    success: bool,
    duration: f64,
}

#[derive(Debug, Serialize)]
struct StatusJson {
    timestamp: Option<String>,
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
}

impl From<SyncStatus> for StatusJson {
    fn from(status: SyncStatus) -> Self {
        Self {
            timestamp: status.timestamp.map(display_time),
            success: status.success,
            message: status.message,
            duration: status.duration,
        }
    }
}

#[derive(Debug, Serialize)]
struct VerificationJson {
    timestamp: String,
    connection_valid: bool,
    test_query_success: bool,
    sync_attempted: bool,
    sync_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    healthy: bool,
    issues: Vec<String>,
}

impl From<VerificationReport> for VerificationJson {
    fn from(report: VerificationReport) -> Self {
        Self {
            timestamp: display_time(report.timestamp),
            healthy: report.is_healthy(),
            issues: report.issues().iter().map(ToString::to_string).collect(),
            connection_valid: report.connection_valid,
            test_query_success: report.test_query_success,
            sync_attempted: report.sync_attempted,
            sync_success: report.sync_success,
            error: report.error,
        }
    }
}

/// Connection details safe to print. The auth token is never included.
#[derive(Debug, Serialize)]
struct ConnectionJson {
    db_path: String,
    sync_url: String,
    db_name: String,
}

impl From<&ReplicaConfig> for ConnectionJson {
    fn from(config: &ReplicaConfig) -> Self {
        Self {
            db_path: config.db_path.display().to_string(),
            sync_url: config.sync_url.clone(),
            db_name: config.db_name.clone(),
        }
    }
}

fn display_time(at: DateTime<Utc>) -> String {
    at.format(DISPLAY_TIME_FORMAT).to_string()
}

fn print_report(report: &CheckReport) {
    let separator = "■".repeat(50).bright_black().to_string();

    if let Some(success) = report.reset {
        println!("Resetting sync status...");
        if success {
            println!("{} Sync status reset", "✓".green().bold());
        } else {
            println!("{} Sync status reset, but the sync attempt failed", "✗".red().bold());
        }
    }

    if let Some(forced) = &report.force_sync {
        println!("Forcing synchronization...");
        if forced.success {
            println!(
                "{} Sync completed in {:.2}s",
                "✓".green().bold(),
                forced.duration
            );
        } else {
            println!(
                "{} Sync failed after {:.2}s",
                "✗".red().bold(),
                forced.duration
            );
        }
    }

    println!("{separator}");
    println!("{} ({})", "TURSO SYNC STATUS".bold(), report.source);
    let status = &report.status;
    println!(
        "  Last sync:  {}",
        status.timestamp.as_deref().unwrap_or("Never")
    );
    println!("  Success:    {}", yes_no(status.success));
    println!("  Message:    {}", status.message);
    if let Some(duration) = status.duration {
        println!("  Duration:   {duration:.2}s");
    }

    if let Some(verification) = &report.verification {
        println!("{separator}");
        println!("{}", "DETAILED VERIFICATION".bold());
        println!("  Checked at:        {}", verification.timestamp);
        println!("  Connection valid:  {}", yes_no(verification.connection_valid));
        println!("  Test query:        {}", yes_no(verification.test_query_success));
        println!("  Sync attempted:    {}", yes_no(verification.sync_attempted));
        println!("  Sync success:      {}", yes_no(verification.sync_success));
        if let Some(error) = &verification.error {
            println!("  Error:             {}", error.red());
        }

        if verification.healthy {
            println!("{} All checks passed", "✓".green().bold());
        } else {
            println!("{} Issues found:", "✗".red().bold());
            for issue in &verification.issues {
                println!("  - {issue}");
            }
        }
    }

    println!("{separator}");
    println!("{}", "CONNECTION".bold());
    println!("  Database path:  {}", report.connection.db_path);
    println!("  Sync URL:       {}", report.connection.sync_url);
    println!("  Database name:  {}", report.connection.db_name);
}

fn yes_no(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_render_without_fractional_seconds() {
        let at = Utc
            .with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
            .single()
            .expect("valid instant");
        let status = StatusJson::from(SyncStatus::succeeded(at, 1.23));
        assert_eq!(status.timestamp.as_deref(), Some("2026-03-14 09:26:53"));
        assert_eq!(status.duration, Some(1.23));
    }

    #[test]
    fn placeholder_renders_null_timestamp() {
        let encoded = serde_json::to_value(StatusJson::from(SyncStatus::initial())).expect("json");
        assert_eq!(
            encoded,
            serde_json::json!({
                "timestamp": null,
                "success": false,
                "message": "No sync attempted yet",
            })
        );
    }

    #[test]
    fn verification_summary_lists_failed_stages() {
        let report = VerificationReport::connection_failed(Utc::now(), "refused");
        let json = VerificationJson::from(report);
        assert!(!json.healthy);
        assert_eq!(
            json.issues,
            vec![
                "Cannot connect to Turso DB".to_string(),
                "Test query failed".to_string(),
                "Synchronization failed".to_string(),
            ]
        );
    }

    #[test]
    fn connection_info_omits_token() {
        let config = ReplicaConfig::new("/data/mail.db", "libsql://mail-acme.turso.io", "hunter2");
        let encoded = serde_json::to_string(&ConnectionJson::from(&config)).expect("json");
        assert!(encoded.contains("mail-acme"));
        assert!(!encoded.contains("hunter2"));
    }
}

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

const TOKEN: &str = "tok-daemon-secret";

fn replica_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin!("replica").to_path_buf()
}

fn replica_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(replica_bin());
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("TURSO_DB_PATH", home.join("replica.db"))
        // Nothing listens on the discard port, so every attempt fails fast.
        .env("TURSO_SYNC_URL", "http://127.0.0.1:9")
        .env("TURSO_AUTH_TOKEN", TOKEN)
        .env("REPLICA_SYNC_TIMEOUT", "2")
        .env("REPLICA_STARTUP_DELAY_MS", "10")
        .env_remove("TURSO_DB_NAME")
        .env_remove("REPLICA_SYNC_INTERVAL");
    cmd
}

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: &Path) -> Self {
        let child = replica_cmd(home)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        Self {
            child,
            home: home.to_path_buf(),
        }
    }

    fn wait_for_socket(&self) {
        let socket = self.home.join(".replica").join("daemon.sock");
        let deadline = Instant::now() + Duration::from_secs(20);
        while Instant::now() < deadline {
            if socket.exists() {
                return;
            }
            sleep(Duration::from_millis(100));
        }
        panic!("daemon socket never appeared at {}", socket.display());
    }

    fn stop(&mut self) {
        let _ = replica_cmd(&self.home).args(["daemon", "stop"]).output();
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(100));
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.stop();
        }
    }
}

#[test]
fn daemon_status_and_stop_when_not_running() {
    let home = TempDir::new().expect("home");

    let assert = replica_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let payload: Value = serde_json::from_str(&stdout).expect("status JSON");
    assert_eq!(payload["running"], Value::Bool(false));

    replica_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

#[test]
fn check_routes_through_running_daemon() {
    let home = TempDir::new().expect("home");
    let mut daemon = DaemonProcess::start(home.path());
    daemon.wait_for_socket();

    let assert = replica_cmd(home.path())
        .args(["check", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let report: Value = serde_json::from_str(&stdout).expect("check JSON");

    assert_eq!(report["source"], "daemon");
    // Bootstrap already recorded an attempt against the unreachable remote.
    assert!(report["status"]["timestamp"].is_string());
    assert_eq!(report["status"]["success"], Value::Bool(false));
    assert!(report["status"].get("duration").is_none());
    assert!(!stdout.contains(TOKEN));

    let status = replica_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success();
    let stdout = String::from_utf8(status.get_output().stdout.clone()).expect("stdout utf8");
    let payload: Value = serde_json::from_str(&stdout).expect("status JSON");
    assert_eq!(payload["running"], Value::Bool(true));
    assert_eq!(payload["interval_secs"], 300);
    assert!(!stdout.contains(TOKEN));

    daemon.stop();
    assert!(!home.path().join(".replica").join("daemon.sock").exists());
}

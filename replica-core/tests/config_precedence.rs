//! Config loading through the public API: file, env, precedence.
//!
//! Each `#[case]` gets its own temp home.

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use replica_core::config::{config_path_at, load_at};
use replica_core::ConfigError;
use rstest::rstest;
use tempfile::TempDir;

fn write_config(home: &TempDir, body: &str) {
    let path = config_path_at(home.path());
    fs::create_dir_all(path.parent().expect("config parent")).expect("mkdir");
    fs::write(path, body).expect("write config");
}

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

const FILE: &str = "db_path: /srv/replica/file.db\n\
                    sync_url: libsql://file-acme.turso.io\n\
                    auth_token: file-token\n\
                    sync_interval_secs: 120\n";

#[rstest]
#[case::file_only(&[], "libsql://file-acme.turso.io", 120)]
#[case::env_url_wins(&[("TURSO_SYNC_URL", "https://env-acme.turso.io")], "https://env-acme.turso.io", 120)]
#[case::env_interval_wins(&[("REPLICA_SYNC_INTERVAL", "30")], "libsql://file-acme.turso.io", 30)]
#[case::blank_env_is_ignored(&[("TURSO_SYNC_URL", "  ")], "libsql://file-acme.turso.io", 120)]
fn env_overrides_file(
    #[case] env: &[(&str, &str)],
    #[case] expected_url: &str,
    #[case] expected_interval: u64,
) {
    let home = TempDir::new().expect("home");
    write_config(&home, FILE);

    let config = load_at(home.path(), env_of(env)).expect("load");
    assert_eq!(config.sync_url, expected_url);
    assert_eq!(config.sync_interval, Duration::from_secs(expected_interval));
    assert_eq!(config.sync_timeout, Duration::from_secs(60));
    assert_eq!(config.startup_delay, Duration::from_millis(1_000));
}

#[test]
fn debug_output_never_contains_the_token() {
    let home = TempDir::new().expect("home");
    write_config(&home, FILE);

    let config = load_at(home.path(), env_of(&[])).expect("load");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("file-token"), "got: {rendered}");
    assert!(rendered.contains("file-acme"));
}

#[test]
fn unknown_keys_are_a_parse_error() {
    let home = TempDir::new().expect("home");
    write_config(&home, "db_path: /tmp/x.db\nsync_every: 5\n");

    let err = load_at(home.path(), env_of(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn non_numeric_timeout_names_the_field() {
    let home = TempDir::new().expect("home");
    write_config(&home, FILE);

    let err = load_at(home.path(), env_of(&[("REPLICA_SYNC_TIMEOUT", "soon")])).unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { field: "sync_timeout_secs", .. }),
        "got: {err}"
    );
}

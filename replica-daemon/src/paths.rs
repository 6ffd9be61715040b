use std::path::{Path, PathBuf};

use replica_core::config::replica_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    replica_root(home).join(DAEMON_SOCKET)
}

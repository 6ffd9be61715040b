use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch};

use replica_core::{ReplicaConfig, StatusStore};
use replica_sync::ReplicaDriver;

use crate::bootstrap::{bootstrap, BootstrapOptions};
use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse, ForceSyncOutcome};
use crate::scheduler::SchedulerState;
use crate::service::ReplicaService;

/// Load config from `home`, start the daemon with the libSQL driver, and
/// block the current thread until it exits.
#[cfg(feature = "libsql")]
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let config = replica_core::config::load_at(home, |key| std::env::var(key).ok())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(
        home.to_path_buf(),
        config,
        Arc::new(replica_sync::LibsqlDriver::new()),
    ))
}

/// Run the daemon: claim the socket, bootstrap the scheduler, then serve
/// status requests until `stop` or ctrl-c.
pub async fn run(
    home: PathBuf,
    config: ReplicaConfig,
    driver: Arc<dyn ReplicaDriver>,
) -> Result<(), DaemonError> {
    // Claim the socket before any sync so a second daemon exits untouched.
    let socket = socket_path(&home);
    let listener = bind_socket(&socket)?;

    let options = BootstrapOptions::from(&config);
    let service = ReplicaService::new(driver, config, StatusStore::new());
    let started_at_unix = unix_seconds_now();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    tracing::info!(
        path = %service.config().db_path.display(),
        url = %service.config().sync_url,
        interval_secs = options.interval.as_secs(),
        "starting replica daemon",
    );

    let scheduler = bootstrap(service.clone(), options, shutdown_tx.subscribe()).await;
    let scheduler_state = match &scheduler {
        Some(handle) => handle.subscribe(),
        None => watch::channel(SchedulerState::Idle).1,
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let home = home.clone();
        let service = service.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                listener,
                socket,
                home,
                service,
                scheduler_state,
                shutdown.clone(),
                shutdown_rx,
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = tokio::spawn(signal_task(
        shutdown_tx.clone(),
        shutdown_tx.subscribe(),
        tokio::signal::ctrl_c(),
    ));

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    if let Some(handle) = scheduler {
        handle.join().await?;
    }

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("replica daemon stopped");
    Ok(())
}

/// Wait for `signal` or shutdown. Shutdown is broadcast whichever way the
/// signal future resolves.
async fn signal_task<F>(
    shutdown: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    signal: F,
) -> Result<(), DaemonError>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(()),
        signal = signal => {
            let _ = shutdown.send(());
            match signal {
                Ok(()) => {
                    tracing::info!("received ctrl-c, shutting down daemon");
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(error = %err, "ctrl-c handler failed, shutting down daemon");
                    Err(io_err("ctrl-c handler", err))
                }
            }
        }
    }
}

fn bind_socket(socket: &Path) -> Result<UnixListener, DaemonError> {
    if let Some(dir) = socket.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    prepare_socket_for_bind(socket)?;

    let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
    set_socket_permissions(socket)?;
    Ok(listener)
}

#[allow(clippy::too_many_arguments)]
async fn socket_server_task(
    listener: UnixListener,
    socket: PathBuf,
    home: PathBuf,
    service: ReplicaService,
    scheduler_state: watch::Receiver<SchedulerState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    tracing::info!(socket = %socket.display(), "listening for status requests");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let service = service.clone();
                let scheduler_state = scheduler_state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        home,
                        service,
                        scheduler_state,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    service: ReplicaService,
    scheduler_state: watch::Receiver<SchedulerState>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        // Copy out of the watch guard; it must not be held across the await.
        let scheduler = *scheduler_state.borrow();
        let response = dispatch(
            &request,
            &home,
            &service,
            scheduler,
            &shutdown_tx,
            started_at_unix,
        )
        .await;

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    request: &DaemonRequest,
    home: &Path,
    service: &ReplicaService,
    scheduler: SchedulerState,
    shutdown_tx: &broadcast::Sender<()>,
    started_at_unix: u64,
) -> DaemonResponse {
    let encoded = match request.cmd.as_str() {
        "status" => Ok(build_status_payload(home, service, scheduler, started_at_unix)),
        "sync" => {
            let (success, duration) = service.force_sync().await;
            serde_json::to_value(ForceSyncOutcome { success, duration })
        }
        "verify" => serde_json::to_value(service.verify().await),
        "reset" => Ok(json!({ "success": service.reset_status().await })),
        "stop" => {
            let _ = shutdown_tx.send(());
            Ok(json!({ "stopping": true }))
        }
        other => return DaemonResponse::error(format!("unknown command '{other}'")),
    };

    match encoded {
        Ok(data) => DaemonResponse::ok(data),
        Err(err) => DaemonResponse::error(format!("failed to encode response: {err}")),
    }
}

fn build_status_payload(
    home: &Path,
    service: &ReplicaService,
    scheduler: SchedulerState,
    started_at_unix: u64,
) -> Value {
    let config = service.config();
    json!({
        "running": true,
        "started_at_unix": started_at_unix,
        "scheduler": scheduler,
        "interval_secs": config.sync_interval.as_secs(),
        "status": service.get_status(),
        "db_path": config.db_path.display().to_string(),
        "sync_url": config.sync_url,
        "db_name": config.db_name,
        "socket": socket_path(home).display().to_string(),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::SocketInUse {
                socket: socket.to_path_buf(),
            });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(source) => Err(DaemonError::TaskJoin { task, source }),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use replica_core::SyncStatus;
    use replica_sync::driver::MockDriver;
    use tempfile::TempDir;

    use super::*;
    use crate::protocol;

    fn daemon_config(home: &Path) -> ReplicaConfig {
        let mut config = ReplicaConfig::new(
            home.join("mail.db"),
            "libsql://mail-acme.turso.io",
            "hunter2",
        );
        config.startup_delay = Duration::from_millis(10);
        config
    }

    async fn wait_for_status(home: &Path) -> SyncStatus {
        let home = home.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            loop {
                match protocol::request_sync_status(&home) {
                    Ok(status) => return status,
                    Err(_) if std::time::Instant::now() < deadline => {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    Err(err) => panic!("daemon never answered: {err}"),
                }
            }
        })
        .await
        .expect("status poll")
    }

    async fn stop_daemon(home: &Path) {
        let home = home.to_path_buf();
        tokio::task::spawn_blocking(move || protocol::request_stop(&home))
            .await
            .expect("stop join")
            .expect("stop request");
    }

    fn service(driver: &MockDriver) -> ReplicaService {
        ReplicaService::new(
            Arc::new(driver.clone()),
            ReplicaConfig::new("/data/mail.db", "libsql://mail-acme.turso.io", "hunter2"),
            StatusStore::new(),
        )
    }

    #[tokio::test]
    async fn status_payload_reports_placeholder_and_never_the_token() {
        let home = TempDir::new().expect("home");
        let driver = MockDriver::new();
        let payload = build_status_payload(home.path(), &service(&driver), SchedulerState::Idle, 42);

        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["started_at_unix"], json!(42u64));
        assert_eq!(payload["scheduler"], json!({"state": "idle"}));
        assert_eq!(payload["db_name"], json!("mail-acme"));
        let status: SyncStatus = serde_json::from_value(payload["status"].clone()).expect("status");
        assert_eq!(status, SyncStatus::initial());
        assert!(!payload.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn dispatch_routes_every_command() {
        let home = TempDir::new().expect("home");
        let driver = MockDriver::new();
        let service = service(&driver);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let running = SchedulerState::Running { tick: 3 };

        let sync = dispatch(&DaemonRequest::new("sync"), home.path(), &service, running, &shutdown_tx, 0).await;
        let outcome: ForceSyncOutcome =
            serde_json::from_value(sync.data.expect("sync data")).expect("decode");
        assert!(outcome.success);
        assert!(service.get_status().success);

        let verify = dispatch(&DaemonRequest::new("verify"), home.path(), &service, running, &shutdown_tx, 0).await;
        assert_eq!(verify.data.expect("verify data")["sync_success"], json!(true));

        driver.fail_sync("offline");
        let reset = dispatch(&DaemonRequest::new("reset"), home.path(), &service, running, &shutdown_tx, 0).await;
        assert_eq!(reset.data.expect("reset data"), json!({"success": false}));
        assert!(!service.get_status().success);

        let unknown = dispatch(&DaemonRequest::new("explode"), home.path(), &service, running, &shutdown_tx, 0).await;
        assert!(!unknown.ok);
        assert_eq!(unknown.error.as_deref(), Some("unknown command 'explode'"));

        let stop = dispatch(&DaemonRequest::new("stop"), home.path(), &service, running, &shutdown_tx, 0).await;
        assert!(stop.ok);
        shutdown_rx.recv().await.expect("shutdown signal");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn daemon_serves_status_and_stops_over_socket() {
        let home = TempDir::new().expect("home");
        let driver = MockDriver::new();
        let config = daemon_config(home.path());

        let daemon = tokio::spawn(run(home.path().to_path_buf(), config, Arc::new(driver.clone())));

        let status = wait_for_status(home.path()).await;

        assert!(status.success, "bootstrap seeded a successful status");
        assert_eq!(driver.sync_count(), 2, "seed + initial scheduler sync");

        stop_daemon(home.path()).await;
        daemon.await.expect("daemon join").expect("daemon result");
        assert!(!socket_path(home.path()).exists(), "socket removed on shutdown");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_daemon_refuses_the_socket_before_syncing() {
        let home = TempDir::new().expect("home");
        let first = MockDriver::new();
        let daemon = tokio::spawn(run(
            home.path().to_path_buf(),
            daemon_config(home.path()),
            Arc::new(first.clone()),
        ));
        wait_for_status(home.path()).await;

        let second = MockDriver::new();
        let err = run(
            home.path().to_path_buf(),
            daemon_config(home.path()),
            Arc::new(second.clone()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DaemonError::SocketInUse { .. }), "got: {err}");
        assert_eq!(second.connect_count(), 0, "no sync against the shared replica");

        stop_daemon(home.path()).await;
        daemon.await.expect("daemon join").expect("daemon result");
        assert_eq!(first.sync_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn client_sync_does_not_hold_the_scheduler_state() {
        let home = TempDir::new().expect("home");
        let driver = MockDriver::new();
        driver.set_sync_delay(Duration::from_millis(500));
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running { tick: 1 });
        let (shutdown_tx, _) = broadcast::channel(1);
        let (server, client) = UnixStream::pair().expect("socket pair");

        let handler = tokio::spawn(handle_socket_client(
            server,
            home.path().to_path_buf(),
            service(&driver),
            state_rx,
            shutdown_tx,
            0,
        ));

        let (reader, mut writer) = client.into_split();
        writer.write_all(b"{\"cmd\":\"sync\"}\n").await.expect("send sync");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(driver.sync_count(), 1, "client sync is in flight");

        // The scheduler must be able to publish while the client's sync runs.
        let publish = tokio::task::spawn_blocking(move || {
            state_tx.send_replace(SchedulerState::Running { tick: 2 });
            state_tx
        });
        let _state_tx = tokio::time::timeout(Duration::from_millis(200), publish)
            .await
            .expect("state update not blocked by client sync")
            .expect("publish join");

        let mut lines = BufReader::new(reader).lines();
        let line = lines.next_line().await.expect("read").expect("response line");
        let response: DaemonResponse = serde_json::from_str(&line).expect("decode");
        assert!(response.ok);
        drop(writer);
        handler.await.expect("handler join").expect("handler result");
    }

    #[tokio::test]
    async fn failed_signal_handler_still_broadcasts_shutdown() {
        let (shutdown_tx, mut observer) = broadcast::channel(4);
        let failing = async {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no signal driver",
            ))
        };

        let result = signal_task(shutdown_tx.clone(), shutdown_tx.subscribe(), failing).await;
        assert!(matches!(result, Err(DaemonError::Io { .. })));
        observer.recv().await.expect("shutdown broadcast");
    }

    #[tokio::test]
    async fn crashed_task_is_reported_as_join_failure() {
        fn explode() -> Result<(), DaemonError> {
            panic!("socket task exploded");
        }

        let joined = tokio::spawn(async { explode() }).await;

        let err = handle_join("socket_server", joined).unwrap_err();
        assert!(
            matches!(err, DaemonError::TaskJoin { task: "socket_server", .. }),
            "got: {err}"
        );
        assert!(err.to_string().starts_with("socket_server task failed"));
    }
}

//! Process Supervisor lifecycle against real child processes.
//!
//! Uses `sh`/`sleep` as stand-in backends through the command override.
//! Tests that need a real listener use `python3` with only the stdlib.

use std::net::TcpListener;
use std::time::{Duration, Instant};

use coordination::supervisor::{BootFailure, ProcessSupervisor, SupervisorConfig};
use coordination::CoordinationError;

fn config(cmd: &[&str], port: u16, window_ms: u64) -> SupervisorConfig {
    SupervisorConfig {
        host: "127.0.0.1".to_string(),
        port,
        readiness_window: Duration::from_millis(window_ms),
        poll_interval: Duration::from_millis(50),
        stop_timeout: Duration::from_secs(2),
        command_override: Some(cmd.iter().map(|s| s.to_string()).collect()),
        ..SupervisorConfig::default()
    }
}

/// Binds `$PORT` and accepts forever. With `fork`, the listener runs in a
/// forked child while the parent just sleeps, like a dev-server reloader.
fn listener_script(fork: bool) -> String {
    let serve = "s = socket.socket(); s.setsockopt(socket.SOL_SOCKET, socket.SO_REUSEADDR, 1); \
                 s.bind(('127.0.0.1', int(os.environ['PORT']))); s.listen(8)\n\
                 while True: s.accept()[0].close()";
    if fork {
        let serve = serve.replace('\n', "\n    ");
        format!("import os, socket, time\nif os.fork() == 0:\n    {serve}\nelse:\n    time.sleep(60)\n")
    } else {
        format!("import os, socket\n{serve}\n")
    }
}

fn accepts(port: u16) -> bool {
    std::net::TcpStream::connect_timeout(
        &format!("127.0.0.1:{port}").parse().unwrap(),
        Duration::from_millis(200),
    )
    .is_ok()
}

/// A port nothing listens on.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ─── Boot failures ───────────────────────────────────────────────────

#[tokio::test]
async fn test_early_exit_is_boot_failure_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = ProcessSupervisor::new(config(
        &["sh", "-c", "echo 'ImportError: no module named flask' >&2; exit 3"],
        closed_port(),
        2000,
    ));

    let err = sup.start(dir.path()).await.unwrap_err();
    match &err {
        BootFailure::Exited { status, stderr } => {
            assert!(status.contains('3'), "status: {status}");
            assert!(stderr.contains("ImportError"), "stderr: {stderr}");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert!(err.diagnostic().starts_with("BOOT_FAIL"));
    assert!(!sup.is_running());
}

#[tokio::test]
async fn test_stderr_excerpt_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = ProcessSupervisor::new(config(
        &["sh", "-c", "i=0; while [ $i -lt 400 ]; do echo 'xxxxxxxxxxxxxxxxxxxx' >&2; i=$((i+1)); done; exit 1"],
        closed_port(),
        3000,
    ));

    match sup.start(dir.path()).await {
        Err(BootFailure::Exited { stderr, .. }) => assert!(stderr.len() <= 2048),
        other => panic!("expected exit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_backend_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = ProcessSupervisor::new(config(&["sleep", "5"], closed_port(), 200));
    let err = sup.start(&dir.path().join("nope")).await.unwrap_err();
    assert!(matches!(
        err,
        BootFailure::Launch(CoordinationError::BackendDirMissing(_))
    ));
}

#[tokio::test]
async fn test_no_entry_point_without_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = ProcessSupervisor::new(SupervisorConfig {
        readiness_window: Duration::from_millis(200),
        ..SupervisorConfig::default()
    });
    let err = sup.start(dir.path()).await.unwrap_err();
    assert!(matches!(
        err,
        BootFailure::Launch(CoordinationError::NoEntryPoint(_))
    ));
}

// ─── Readiness ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_surviving_process_is_ready_after_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = ProcessSupervisor::new(config(&["sleep", "30"], closed_port(), 300));

    sup.start(dir.path()).await.unwrap();
    assert!(sup.is_running());
    sup.stop().await;
    assert!(!sup.is_running());
}

#[tokio::test]
async fn test_accepting_port_ends_wait_early() {
    let dir = tempfile::tempdir().unwrap();
    let script = listener_script(false);
    let mut sup =
        ProcessSupervisor::new(config(&["python3", "-c", &script], closed_port(), 10_000));

    let started = Instant::now();
    sup.start(dir.path()).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    sup.stop().await;
}

#[tokio::test]
async fn test_foreign_listener_blocks_start() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut sup = ProcessSupervisor::new(SupervisorConfig {
        stop_timeout: Duration::from_millis(300),
        ..config(&["sleep", "30"], port, 10_000)
    });

    let err = sup.start(dir.path()).await.unwrap_err();
    assert!(matches!(err, BootFailure::PortInUse { .. }), "got {err:?}");
    assert!(err.diagnostic().starts_with("BOOT_FAIL"));
    assert!(!sup.is_running());
    drop(listener);
}

// ─── Stop semantics ──────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = ProcessSupervisor::new(config(&["sleep", "30"], closed_port(), 200));

    // Never started.
    sup.stop().await;

    sup.start(dir.path()).await.unwrap();
    sup.stop().await;
    sup.stop().await;
    assert!(!sup.is_running());
}

#[tokio::test]
async fn test_restart_replaces_previous_process() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = ProcessSupervisor::new(config(&["sleep", "30"], closed_port(), 200));

    sup.start(dir.path()).await.unwrap();
    sup.start(dir.path()).await.unwrap();
    assert!(sup.is_running());
    sup.stop().await;
    assert!(!sup.is_running());
}

#[tokio::test]
async fn test_stop_kills_forked_listener() {
    let dir = tempfile::tempdir().unwrap();
    let port = closed_port();
    let script = listener_script(true);
    let mut sup = ProcessSupervisor::new(config(&["python3", "-c", &script], port, 5_000));

    sup.start(dir.path()).await.unwrap();
    assert!(accepts(port), "forked listener never came up");

    sup.stop().await;
    assert!(!accepts(port), "forked listener survived stop()");

    // A second start must boot a fresh process, not reuse a stale server.
    sup.start(dir.path()).await.unwrap();
    assert!(sup.is_running());
    assert!(accepts(port));
    sup.stop().await;
    assert!(!accepts(port));
}

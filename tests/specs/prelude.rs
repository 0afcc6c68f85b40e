//! Shared helpers for daemon specs.

use resolvix_daemon::lifecycle::{start, Config, StartupResult};
use resolvix_engine::TailerConfig;
use std::time::Duration;

pub struct TestDaemon {
    pub startup: StartupResult,
    pub client: reqwest::Client,
    /// Keeps the state/config tempdir alive for the test.
    pub dir: tempfile::TempDir,
}

impl TestDaemon {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.startup.control_addr)
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.startup.daemon.shutdown();
    }
}

/// Start an in-process daemon on ephemeral ports with tempdir-backed state.
pub async fn start_daemon(mutate: impl FnOnce(&mut Config)) -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    // The daemon's own log is auto-monitored; make sure it exists
    std::fs::write(state_dir.join("daemon.log"), "").unwrap();

    let mut config = Config {
        config_path: dir.path().join("config.json"),
        state_dir,
        control_port: 0,
        logs_port: 0,
        telemetry_port: 0,
        node_ip: Some("10.0.0.7".to_string()),
        // Keep periodic work out of the way unless a spec opts in
        telemetry_period: Duration::from_secs(3600),
        heartbeat_period: Duration::from_secs(3600),
        tailer: TailerConfig {
            poll_interval: Duration::from_millis(10),
            paused_poll_interval: Duration::from_millis(50),
            reopen_attempts: 3,
            reopen_backoff: Duration::from_millis(10),
        },
        ..Config::default()
    };
    mutate(&mut config);

    let startup = start(config).await.unwrap();
    TestDaemon {
        startup,
        client: reqwest::Client::new(),
        dir,
    }
}

/// Create a file under the test dir and return its absolute path as a string.
pub fn touch(daemon: &TestDaemon, name: &str) -> String {
    let path = daemon.dir.path().join(name);
    std::fs::write(&path, "").unwrap();
    path.to_string_lossy().into_owned()
}

/// Poll `check` until it returns true or the deadline passes.
pub async fn eventually<F: FnMut() -> bool>(mut check: F, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

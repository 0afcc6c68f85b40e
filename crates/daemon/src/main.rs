// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolvix collector daemon (resolvixd)
//!
//! Long-running node-resident process that tails log files, classifies and
//! filters error events, samples host telemetry, and serves the control
//! plane plus two streaming sockets.
//!
//! Exit codes: 0 clean shutdown, 1 startup misconfiguration, 2
//! unrecoverable runtime fault.

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use resolvix_daemon::lifecycle::{
    self, Config, DbConfig, LifecycleError, StartupResult, SHUTDOWN_GRACE,
};

#[derive(Debug, Parser)]
#[command(
    name = "resolvixd",
    version,
    about = "Node-resident log and telemetry collector daemon"
)]
struct Args {
    /// Initial log file to monitor at startup
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Ticket bus submission endpoint
    #[arg(long)]
    api_url: Option<String>,

    /// Telemetry ingestion base URL
    #[arg(long)]
    telemetry_backend_url: Option<String>,

    /// Bearer token for telemetry ingestion
    #[arg(long)]
    telemetry_jwt_token: Option<String>,

    /// Rule store host (suppression disabled unless all --db-* flags are set)
    #[arg(long)]
    db_host: Option<String>,

    #[arg(long)]
    db_name: Option<String>,

    #[arg(long)]
    db_user: Option<String>,

    #[arg(long)]
    db_password: Option<String>,

    #[arg(long, default_value_t = 5432)]
    db_port: u16,

    /// Persisted monitoring config path
    #[arg(long, default_value = lifecycle::DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    /// State directory (daemon log, outbox, lock file)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Control-plane HTTP port
    #[arg(long)]
    control_port: Option<u16>,

    /// Live-logs stream port
    #[arg(long)]
    logs_port: Option<u16>,

    /// Telemetry stream port
    #[arg(long)]
    telemetry_port: Option<u16>,

    /// Node IP override (auto-detected when absent)
    #[arg(long)]
    node_ip: Option<String>,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config {
            log_file: self.log_file,
            api_url: self.api_url,
            telemetry_backend_url: self.telemetry_backend_url,
            telemetry_jwt_token: self.telemetry_jwt_token,
            config_path: self.config_path,
            node_ip: self.node_ip,
            ..Config::default()
        };
        if let Some(state_dir) = self.state_dir {
            config.state_dir = state_dir;
        }
        if let Some(port) = self.control_port {
            config.control_port = port;
        }
        if let Some(port) = self.logs_port {
            config.logs_port = port;
        }
        if let Some(port) = self.telemetry_port {
            config.telemetry_port = port;
        }

        // Suppression needs the full set of store flags
        config.db = match (self.db_host, self.db_name, self.db_user, self.db_password) {
            (Some(host), Some(name), Some(user), Some(password)) => Some(DbConfig {
                host,
                port: self.db_port,
                name,
                user,
                password,
            }),
            _ => None,
        };

        config
    }
}

#[tokio::main]
async fn main() {
    let config = Args::parse().into_config();

    // Rotate our own log if it has grown too large, then mark the startup
    // attempt before tracing comes up
    rotate_log_if_needed(&config.daemon_log_path());
    if let Err(e) = write_startup_marker(&config) {
        eprintln!("resolvixd: cannot write to log at {}: {e}", config.daemon_log_path().display());
        std::process::exit(1);
    }

    let log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("resolvixd: failed to set up logging: {e}");
            std::process::exit(1);
        }
    };

    info!("starting resolvixd");

    let startup = match lifecycle::start(config.clone()).await {
        Ok(s) => s,
        Err(LifecycleError::LockFailed(path)) => {
            let pid = std::fs::read_to_string(&path).unwrap_or_default();
            eprintln!("resolvixd is already running (lock: {})", path.display());
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(e) => {
            write_startup_error(&config, &e);
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let code = run_until_shutdown(startup).await;
    // Flush the non-blocking writer before exiting
    drop(log_guard);
    std::process::exit(code);
}

/// Wait for a shutdown signal or a fatal server error, then drain.
async fn run_until_shutdown(startup: StartupResult) -> i32 {
    let StartupResult {
        daemon,
        fatal,
        server_tasks,
        ..
    } = startup;

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return 2;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            return 2;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = daemon.shutdown.cancelled() => {
            // A server task cancelled the token after a fatal error
        }
    }

    daemon.shutdown();

    // Give in-flight requests the grace period, then abandon them
    let drain = async {
        for task in server_tasks {
            let _ = task.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        error!("shutdown grace period expired, abandoning in-flight requests");
    }

    if fatal.load(Ordering::SeqCst) {
        error!("daemon stopped after runtime fault");
        2
    } else {
        info!("daemon stopped");
        0
    }
}

/// Maximum daemon log size before startup rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log at startup if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- resolvixd: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- resolvixd: starting (pid: ";

fn write_startup_marker(config: &Config) -> std::io::Result<()> {
    use std::io::Write;

    let log_path = config.daemon_log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously so it is visible even if the process
/// exits before the non-blocking tracing writer flushes.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.daemon_log_path())
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.daemon_log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let dir = log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("daemon log path has no parent"))?;
    let name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("daemon log path has no file name"))?;

    // Rotation happens at startup via rotate_log_if_needed
    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

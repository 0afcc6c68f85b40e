// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup wiring, and shutdown.
//!
//! `start` builds the whole pipeline — supervisor + tailers, suppression
//! cache, outbox + sender, telemetry collector, broadcast hubs, and the
//! three listeners — and returns a handle the main loop (and the specs)
//! drive. All tasks observe one root cancellation token.

use parking_lot::{Mutex, RwLock};
use resolvix_core::{MonitoredFile, MonitoredFileSpec, Priority, TelemetrySnapshot};
use resolvix_engine::{
    run_sender, RuleCache, SenderConfig, Supervisor, TailerConfig, TelemetryCollector,
    TicketPublisher,
};
use resolvix_storage::{ConfigStore, Outbox};
use sqlx::postgres::PgPoolOptions;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broadcast::{LogHub, TelemetryHub};
use crate::pipeline::{run_pipeline, PipelineCounters};
use crate::{control, env, streams};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/resolvix/config.json";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/resolvix";
pub const DEFAULT_CONTROL_PORT: u16 = 8754;
pub const DEFAULT_LOGS_PORT: u16 = 8755;
pub const DEFAULT_TELEMETRY_PORT: u16 = 8756;

pub const DEFAULT_TELEMETRY_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(15);
pub const DEFAULT_RULE_TTL: Duration = Duration::from_secs(60);
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub const MAX_QUEUE: usize = 1000;
pub const SUBSCRIBER_BUFFER: usize = 256;
pub const REPLAY_RING: usize = 100;
pub const TOP_PROCESSES: usize = 10;

/// Label for the daemon's own log entry, immune to control-plane removal.
pub const DAEMON_LOG_LABEL: &str = "resolvix_daemon";

/// Errors that can occur during daemon startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Another resolvixd instance holds the lock at {0}")]
    LockFailed(PathBuf),

    #[error("Config error: {0}")]
    Config(#[from] resolvix_storage::ConfigError),

    #[error("Outbox error: {0}")]
    Outbox(#[from] resolvix_storage::OutboxError),

    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },
}

/// Rule store connection settings. Suppression is disabled unless all five
/// flags were supplied.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial bootstrap file to monitor.
    pub log_file: Option<PathBuf>,
    /// Ticket bus submission endpoint.
    pub api_url: Option<String>,
    /// Telemetry ingestion base URL.
    pub telemetry_backend_url: Option<String>,
    pub telemetry_jwt_token: Option<String>,
    pub db: Option<DbConfig>,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    pub control_port: u16,
    pub logs_port: u16,
    pub telemetry_port: u16,
    /// Override for the node IP reported on events and matched against
    /// node-pinned rules. Auto-detected when absent.
    pub node_ip: Option<String>,
    pub telemetry_period: Duration,
    pub heartbeat_period: Duration,
    pub rule_ttl: Duration,
    pub max_queue: usize,
    pub tailer: TailerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: None,
            api_url: None,
            telemetry_backend_url: None,
            telemetry_jwt_token: None,
            db: None,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            state_dir: env::state_dir().unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
            control_port: env::control_port().unwrap_or(DEFAULT_CONTROL_PORT),
            logs_port: env::logs_port().unwrap_or(DEFAULT_LOGS_PORT),
            telemetry_port: env::telemetry_port().unwrap_or(DEFAULT_TELEMETRY_PORT),
            node_ip: None,
            telemetry_period: env::telemetry_period().unwrap_or(DEFAULT_TELEMETRY_PERIOD),
            heartbeat_period: env::heartbeat_period().unwrap_or(DEFAULT_HEARTBEAT_PERIOD),
            rule_ttl: env::rule_ttl().unwrap_or(DEFAULT_RULE_TTL),
            max_queue: env::max_queue().unwrap_or(MAX_QUEUE),
            tailer: TailerConfig {
                poll_interval: env::poll_interval()
                    .unwrap_or_else(|| TailerConfig::default().poll_interval),
                ..TailerConfig::default()
            },
        }
    }
}

impl Config {
    pub fn daemon_log_path(&self) -> PathBuf {
        self.state_dir.join("daemon.log")
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.state_dir.join("telemetry_queue")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("resolvixd.lock")
    }
}

/// Shared daemon state handed to every task and request handler.
pub struct Daemon {
    pub supervisor: Arc<Supervisor>,
    pub rules: Arc<RuleCache>,
    pub outbox: Arc<Mutex<Outbox>>,
    pub log_hub: Arc<LogHub>,
    pub telemetry_hub: Arc<TelemetryHub>,
    pub counters: Arc<PipelineCounters>,
    pub latest_snapshot: Arc<RwLock<Option<TelemetrySnapshot>>>,
    pub config_store: ConfigStore,
    pub node_ip: String,
    pub start_time: Instant,
    pub shutdown: CancellationToken,
    /// Held for the daemon lifetime; released on drop.
    _instance_lock: std::fs::File,
}

/// A started daemon: shared state plus the bound listener addresses.
pub struct StartupResult {
    pub daemon: Arc<Daemon>,
    pub control_addr: SocketAddr,
    pub logs_addr: SocketAddr,
    pub telemetry_addr: SocketAddr,
    /// Set when a server task died unexpectedly.
    pub fatal: Arc<AtomicBool>,
    pub server_tasks: Vec<JoinHandle<()>>,
}

/// Build and start the whole daemon. Binds all three listeners before
/// returning so port conflicts surface as startup errors.
pub async fn start(config: Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    let instance_lock = acquire_instance_lock(&config)?;

    let shutdown = CancellationToken::new();
    let node_ip = config
        .node_ip
        .clone()
        .unwrap_or_else(|| detect_node_ip().unwrap_or_else(|| "127.0.0.1".to_string()));

    // Monitored set + tailers
    let config_store = ConfigStore::new(&config.config_path);
    let (line_tx, line_rx) = tokio::sync::mpsc::channel(1024);
    let supervisor = Arc::new(Supervisor::new(
        config_store.clone(),
        line_tx,
        shutdown.clone(),
        config.tailer.clone(),
    ));
    bootstrap_monitored_set(&config, &config_store, &supervisor)?;

    // Suppression
    let pool = match &config.db {
        Some(db) => match PgPoolOptions::new()
            .max_connections(4)
            .connect_lazy(&db.dsn())
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "invalid rule store DSN, suppression disabled");
                None
            }
        },
        None => {
            info!("no rule store configured, suppression disabled");
            None
        }
    };
    let rules = Arc::new(RuleCache::new(pool, node_ip.clone(), config.rule_ttl));

    // Durable outbox + sender
    let outbox = Arc::new(Mutex::new(Outbox::open(
        config.outbox_path(),
        config.max_queue,
    )?));
    if let Some(backend) = &config.telemetry_backend_url {
        let sender_config = SenderConfig {
            url: format!("{}/api/telemetry/snapshot", backend.trim_end_matches('/')),
            token: config.telemetry_jwt_token.clone(),
            ..SenderConfig::default()
        };
        tokio::spawn(run_sender(
            Arc::clone(&outbox),
            sender_config,
            shutdown.clone(),
        ));
    } else {
        info!("no telemetry backend configured, outbox will accumulate");
    }

    // Hubs + pipeline
    let log_hub = Arc::new(LogHub::new(SUBSCRIBER_BUFFER, REPLAY_RING));
    let telemetry_hub = Arc::new(TelemetryHub::new(SUBSCRIBER_BUFFER));
    let counters = Arc::new(PipelineCounters::default());
    let publisher = TicketPublisher::new(config.api_url.clone());
    tokio::spawn(run_pipeline(
        line_rx,
        Arc::clone(&rules),
        publisher,
        Arc::clone(&log_hub),
        Arc::clone(&counters),
        node_ip.clone(),
        shutdown.clone(),
    ));

    // Telemetry collector
    let latest_snapshot = Arc::new(RwLock::new(None));
    tokio::spawn(run_telemetry(
        TelemetryCollector::new(None, node_ip.clone(), TOP_PROCESSES),
        config.telemetry_period,
        Arc::clone(&telemetry_hub),
        Arc::clone(&outbox),
        Arc::clone(&latest_snapshot),
        shutdown.clone(),
    ));

    // Heartbeats
    tokio::spawn(run_heartbeats(
        Arc::clone(&log_hub),
        Arc::clone(&telemetry_hub),
        config.heartbeat_period,
        shutdown.clone(),
    ));

    let daemon = Arc::new(Daemon {
        supervisor,
        rules,
        outbox,
        log_hub,
        telemetry_hub,
        counters,
        latest_snapshot,
        config_store,
        node_ip,
        start_time: Instant::now(),
        shutdown: shutdown.clone(),
        _instance_lock: instance_lock,
    });

    // Listeners: a bind failure is fatal
    let control_listener = bind(config.control_port).await?;
    let logs_listener = bind(config.logs_port).await?;
    let telemetry_listener = bind(config.telemetry_port).await?;
    let control_addr = control_listener.local_addr()?;
    let logs_addr = logs_listener.local_addr()?;
    let telemetry_addr = telemetry_listener.local_addr()?;

    let fatal = Arc::new(AtomicBool::new(false));
    let server_tasks = vec![
        spawn_server(
            control_listener,
            control::router(Arc::clone(&daemon)),
            shutdown.clone(),
            Arc::clone(&fatal),
            "control",
        ),
        spawn_server(
            logs_listener,
            streams::logs_router(Arc::clone(&daemon)),
            shutdown.clone(),
            Arc::clone(&fatal),
            "logs stream",
        ),
        spawn_server(
            telemetry_listener,
            streams::telemetry_router(Arc::clone(&daemon)),
            shutdown.clone(),
            Arc::clone(&fatal),
            "telemetry stream",
        ),
    ];

    info!(
        control = %control_addr,
        logs = %logs_addr,
        telemetry = %telemetry_addr,
        "resolvixd ready"
    );

    Ok(StartupResult {
        daemon,
        control_addr,
        logs_addr,
        telemetry_addr,
        fatal,
        server_tasks,
    })
}

impl Daemon {
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Seed the supervisor: persisted entries, the daemon's own log, and the
/// bootstrap `--log-file`.
fn bootstrap_monitored_set(
    config: &Config,
    store: &ConfigStore,
    supervisor: &Supervisor,
) -> Result<(), LifecycleError> {
    let persisted = store.load()?;
    for file in persisted {
        supervisor.adopt(file);
    }

    // The daemon's own log is always monitored and cannot be removed
    let daemon_log = config.daemon_log_path();
    if !supervisor.list().iter().any(|f| f.label == DAEMON_LOG_LABEL) {
        supervisor.adopt(MonitoredFile::auto(
            daemon_log,
            DAEMON_LOG_LABEL.to_string(),
            Priority::Critical,
        ));
    }

    if let Some(log_file) = &config.log_file {
        let path = log_file.to_string_lossy().into_owned();
        let already = supervisor.list().iter().any(|f| f.path == *log_file);
        if !already {
            let outcome = supervisor.add(vec![MonitoredFileSpec {
                path,
                label: None,
                priority: Some("high".to_string()),
            }]);
            for failed in outcome.failed {
                warn!(
                    path = %failed.path,
                    error = %failed.error,
                    "bootstrap log file not monitored"
                );
            }
        }
    }

    supervisor.persist();
    Ok(())
}

fn acquire_instance_lock(config: &Config) -> Result<std::fs::File, LifecycleError> {
    use fs2::FileExt;

    let lock_path = config.lock_path();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(lock_path))?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

async fn bind(port: u16) -> Result<TcpListener, LifecycleError> {
    TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|source| LifecycleError::Bind { port, source })
}

fn spawn_server(
    listener: TcpListener,
    router: axum::Router,
    shutdown: CancellationToken,
    fatal: Arc<AtomicBool>,
    name: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await;
        if let Err(e) = result {
            error!(server = name, error = %e, "server task failed");
            fatal.store(true, Ordering::SeqCst);
            shutdown.cancel();
        }
    })
}

/// Periodic telemetry sampling: publish to the stream and enqueue to the
/// outbox regardless of whether anyone is listening.
async fn run_telemetry(
    mut collector: TelemetryCollector,
    period: Duration,
    hub: Arc<TelemetryHub>,
    outbox: Arc<Mutex<Outbox>>,
    latest: Arc<RwLock<Option<TelemetrySnapshot>>>,
    cancel: CancellationToken,
) {
    // First sample after one full period: sysinfo CPU deltas need a
    // baseline refresh to measure against
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {}
        }

        let snapshot = collector.sample();
        *latest.write() = Some(snapshot.clone());
        hub.publish(&snapshot);

        match serde_json::to_value(&snapshot) {
            Ok(payload) => {
                if let Err(e) = outbox.lock().enqueue(payload) {
                    warn!(error = %e, "failed to enqueue telemetry snapshot");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize telemetry snapshot"),
        }
    }
}

async fn run_heartbeats(
    log_hub: Arc<LogHub>,
    telemetry_hub: Arc<TelemetryHub>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {}
        }
        log_hub.heartbeat();
        telemetry_hub.heartbeat();
    }
}

/// Best-effort local IP discovery: a connected UDP socket reveals the
/// outbound interface address without sending a packet.
fn detect_node_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}


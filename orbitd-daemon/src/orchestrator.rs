//! Daemon orchestration -- client assembly and scheduler lifecycle.
//!
//! The [`Orchestrator`] is the central coordinator of `orbitd`. It builds the
//! Docker and registry clients from configuration, owns the update
//! [`Scheduler`], and drives it until a shutdown signal arrives.
//!
//! # Lifecycle
//!
//! 1. Write the PID file (if configured)
//! 2. Ping Docker; an unreachable daemon is only a warning, cycles retry
//! 3. Spawn the scheduler task (first cycle runs immediately)
//! 4. Wait for `SIGTERM` / `SIGINT`
//! 5. Cancel the scheduler; an in-flight replacement finishes or rolls back
//! 6. Remove the PID file

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use orbitd_core::config::OrbitdConfig;
use orbitd_updater::{
    BollardDockerClient, CycleReport, DockerClient, HttpRegistryClient, RegistryClient,
    Scheduler, UpdaterConfig,
};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator<D: DockerClient, R: RegistryClient> {
    /// Loaded and validated configuration.
    config: OrbitdConfig,
    /// Docker client shared with the scheduler.
    docker: Arc<D>,
    /// Update scheduler, shared with its background task.
    scheduler: Arc<Scheduler<D, R>>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator<BollardDockerClient, HttpRegistryClient> {
    /// Build the production orchestrator from a loaded configuration.
    ///
    /// Installs the metrics recorder when `[metrics].enabled` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The metrics endpoint cannot be bound
    /// - A client cannot be constructed
    pub fn build(config: OrbitdConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let updater_config = UpdaterConfig::from_core(&config.updater);
        let docker = Arc::new(
            BollardDockerClient::connect(&config.docker.socket)
                .map_err(|e| anyhow::anyhow!("failed to create docker client: {}", e))?,
        );
        let registry = Arc::new(
            HttpRegistryClient::new(updater_config.tag_list_timeout)
                .map_err(|e| anyhow::anyhow!("failed to create registry client: {}", e))?,
        );

        Self::with_clients(config, docker, registry)
    }
}

impl<D: DockerClient, R: RegistryClient> Orchestrator<D, R> {
    /// Build an orchestrator around existing clients.
    pub fn with_clients(config: OrbitdConfig, docker: Arc<D>, registry: Arc<R>) -> Result<Self> {
        let updater_config = UpdaterConfig::from_core(&config.updater);
        updater_config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid updater settings: {}", e))?;

        let scheduler = Scheduler::new(updater_config, Arc::clone(&docker), registry);
        tracing::info!(
            policy = %scheduler.config().policy,
            interval_secs = scheduler.config().interval.as_secs(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            docker,
            scheduler: Arc::new(scheduler),
            start_time: Instant::now(),
        })
    }

    /// Run until `SIGTERM` or `SIGINT`.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed or the PID
    /// file cannot be written.
    pub async fn run(&self) -> Result<()> {
        let shutdown = shutdown_signal()?;
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let _pid_file = self
            .pid_file_path()
            .map(|path| PidFile::create(&path))
            .transpose()?;

        self.check_docker().await;

        let cancel = CancellationToken::new();
        let scheduler_task = {
            let scheduler = Arc::clone(&self.scheduler);
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };
        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| metrics_server::spawn_uptime_updater(self.start_time, cancel.clone()));

        tracing::info!("orbitd running");
        shutdown.await;

        tracing::info!("cancelling update scheduler");
        cancel.cancel();
        if let Err(e) = scheduler_task.await {
            tracing::error!(error = %e, "update scheduler task failed");
        }
        if let Some(task) = uptime_task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "uptime updater task failed");
            }
        }

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "orbitd shut down"
        );
        Ok(())
    }

    /// Run a single update cycle.
    ///
    /// `SIGTERM` / `SIGINT` cancel the rest of the cycle; a replacement
    /// already in flight still finishes or rolls back before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed or the
    /// containers cannot be listed.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let shutdown = shutdown_signal()?;
        self.run_once_until(shutdown).await
    }

    /// Run a single update cycle, cancelling it when `shutdown` completes.
    pub async fn run_once_until<F>(&self, shutdown: F) -> Result<CycleReport>
    where
        F: Future<Output = ()>,
    {
        self.check_docker().await;

        let cancel = CancellationToken::new();
        let cycle = self.scheduler.run_cycle(&cancel);
        tokio::pin!(cycle);

        let finished = tokio::select! {
            result = &mut cycle => Some(result),
            () = shutdown => None,
        };
        let result = match finished {
            Some(result) => result,
            None => {
                tracing::info!("shutdown requested, finishing in-flight update");
                cancel.cancel();
                cycle.await
            }
        };

        result.map_err(|e| anyhow::anyhow!("update cycle failed: {}", e))
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &OrbitdConfig {
        &self.config
    }

    async fn check_docker(&self) {
        match self.docker.ping().await {
            Ok(()) => tracing::debug!("docker daemon reachable"),
            Err(e) => tracing::warn!(
                error = %e,
                "docker daemon unreachable, update cycles will keep retrying"
            ),
        }
    }

    fn pid_file_path(&self) -> Option<PathBuf> {
        let path = &self.config.general.pid_file;
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

/// Install `SIGTERM` and `SIGINT` handlers.
///
/// The returned future completes on the first signal received.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = name, "shutdown signal received");
    })
}

/// PID file held for the lifetime of the daemon; removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create `path` with the current PID.
    ///
    /// The file is created exclusively and owner-only (`0600`), so a second
    /// instance or a planted symlink makes this fail instead of being
    /// overwritten. Missing parent directories are created `0700`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be written.
    pub fn create(path: &Path) -> Result<Self> {
        use std::io::{ErrorKind, Write};

        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }

        let mut file = match open_exclusive(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = std::fs::read_to_string(path).unwrap_or_default();
                return Err(anyhow::anyhow!(
                    "PID file {} already exists (pid {}), is another orbitd running?",
                    path.display(),
                    owner.trim()
                ));
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "cannot create PID file {}: {}",
                    path.display(),
                    e
                ));
            }
        };

        let pid = std::process::id();
        writeln!(file, "{pid}")?;
        tracing::info!(pid, path = %path.display(), "PID file written");

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove PID file"
            ),
        }
    }
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    // O_CREAT|O_EXCL also refuses an existing symlink, dangling or not.
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_exclusive(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

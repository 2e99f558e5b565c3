//! Replacement transaction -- swapping one container's image with rollback.
//!
//! # State machine
//!
//! ```text
//!  Running ──stop──▶ Stopped ──rename──▶ Renamed ──run──▶ Started ──▶ Committed
//!     │                 │                   │
//!     ▼                 ▼ (restart)          ▼ (rename back + restart)
//!  Aborted      RolledBack | Down       RolledBack | Down
//! ```
//!
//! `Aborted` covers every exit before the engine was touched: the container
//! is not running, it is the daemon's own container, or cancellation was
//! requested. Once `Stop` has been issued the transaction ignores
//! cancellation and always drives itself to a terminal phase.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use orbitd_core::types::ContainerDescriptor;

use crate::docker::{ContainerSnapshot, DockerClient};
use crate::error::UpdaterError;
use crate::identity::SelfDetector;

/// Suffix of the name the old container is parked under during a swap.
pub const BACKUP_SUFFIX: &str = "-orbitd-old";

/// Backup name for a container name.
pub fn backup_name(name: &str) -> String {
    format!("{name}{BACKUP_SUFFIX}")
}

/// Phase of a [`ReplacementTransaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Original container running under its own name.
    Running,
    /// Original container stopped, not yet renamed.
    Stopped,
    /// Original container parked under the backup name.
    Renamed,
    /// Replacement container created and started.
    Started,
    /// Replacement in place, backup removed.
    Committed,
    /// Replacement failed, original restored and running.
    RolledBack,
    /// Replacement and restore both failed; nothing runs under the name.
    Down,
    /// Left before touching the engine.
    Aborted,
}

impl Phase {
    /// Whether the transaction can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Committed | Self::RolledBack | Self::Down | Self::Aborted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Renamed => "renamed",
            Self::Started => "started",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Down => "down",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine operation that can fail mid-transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Stop,
    Rename,
    Start,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Rename => "rename",
            Self::Start => "start",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transaction left without touching the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The container is not running; its run state is never changed.
    NotRunning,
    /// The container is the daemon itself.
    SelfContainer,
    /// Cancellation was requested before `Stop`.
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotRunning => "container is not running",
            Self::SelfContainer => "container is the daemon itself",
            Self::Cancelled => "cancelled before stop",
        };
        f.write_str(s)
    }
}

/// Terminal result of a transaction that did not end `Down`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// The replacement runs under the original name.
    Committed { new_container_id: String },
    /// `step` failed and the original container was restored.
    RolledBack { step: Step, reason: String },
    /// Nothing was changed.
    Aborted(AbortReason),
}

/// One attempt at swapping a container onto a new image.
///
/// Created per container per cycle and dropped when [`execute`](Self::execute)
/// returns; never persisted.
#[derive(Debug, Clone)]
pub struct ReplacementTransaction {
    container_id: String,
    container_name: String,
    backup_name: String,
    target_image: String,
    old_image_id: String,
    new_image_id: Option<String>,
    new_container_id: Option<String>,
    cleanup: bool,
    phase: Phase,
}

impl ReplacementTransaction {
    /// Prepares a swap of `container` onto `target_image`.
    pub fn new(container: &ContainerDescriptor, target_image: impl Into<String>) -> Self {
        Self {
            container_id: container.id.clone(),
            container_name: container.name.clone(),
            backup_name: backup_name(&container.name),
            target_image: target_image.into(),
            old_image_id: container.image_id.clone(),
            new_image_id: None,
            new_container_id: None,
            cleanup: false,
            phase: Phase::Running,
        }
    }

    /// Removes the old image after a successful swap.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Local ID of the target image; cleanup skips the old image when they match.
    pub fn with_new_image_id(mut self, id: impl Into<String>) -> Self {
        self.new_image_id = Some(id.into());
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn backup_name(&self) -> &str {
        &self.backup_name
    }

    pub fn new_container_id(&self) -> Option<&str> {
        self.new_container_id.as_deref()
    }

    /// Runs the transaction to a terminal phase.
    ///
    /// # Errors
    ///
    /// - `EngineOperation` with [`Step::Stop`]: stop failed, nothing else was touched
    /// - `RollbackFailed`: the phase is [`Phase::Down`]
    /// - any inspect error: nothing was touched
    pub async fn execute<D: DockerClient>(
        &mut self,
        docker: &D,
        detector: &dyn SelfDetector,
        cancel: &CancellationToken,
    ) -> Result<TransactionOutcome, UpdaterError> {
        let snapshot = docker.inspect_container(&self.container_id).await?;
        self.container_name = snapshot.name.clone();
        self.backup_name = backup_name(&snapshot.name);

        if !snapshot.is_running() {
            return Ok(self.abort(AbortReason::NotRunning));
        }
        if detector.is_self(&snapshot.id) {
            return Ok(self.abort(AbortReason::SelfContainer));
        }
        if cancel.is_cancelled() {
            return Ok(self.abort(AbortReason::Cancelled));
        }

        docker
            .stop_container(&self.container_id)
            .await
            .map_err(|e| self.step_error(Step::Stop, &e))?;
        self.phase = Phase::Stopped;
        debug!(container = %self.container_name, "stopped container");

        if let Err(e) = docker
            .rename_container(&self.container_id, &self.backup_name)
            .await
        {
            let failure = self.step_error(Step::Rename, &e);
            warn!(container = %self.container_name, error = %failure, "rename failed, restarting original");
            return match docker.start_container(&self.container_id).await {
                Ok(()) => Ok(self.rolled_back(Step::Rename, &failure)),
                Err(start_err) => Err(self.down(format!("{failure}; restart failed: {start_err}"))),
            };
        }
        self.phase = Phase::Renamed;
        debug!(container = %self.container_name, backup = %self.backup_name, "parked original container");

        let blueprint = snapshot.blueprint_for(&self.target_image);
        match docker.run_container(&blueprint).await {
            Ok(new_id) => {
                self.new_container_id = Some(new_id.clone());
                self.phase = Phase::Started;
                self.commit(docker, &snapshot).await;
                Ok(TransactionOutcome::Committed {
                    new_container_id: new_id,
                })
            }
            Err(e) => {
                let failure = self.step_error(Step::Start, &e);
                warn!(container = %self.container_name, error = %failure, "replacement failed, rolling back");
                self.roll_back(docker, failure).await
            }
        }
    }

    async fn commit<D: DockerClient>(&mut self, docker: &D, snapshot: &ContainerSnapshot) {
        self.phase = Phase::Committed;
        info!(
            container = %self.container_name,
            image = %self.target_image,
            "replacement container started"
        );

        if let Err(e) = docker.remove_container(&snapshot.id).await {
            warn!(container = %self.backup_name, error = %e, "failed to remove old container");
        }

        if !self.cleanup || self.old_image_id.is_empty() {
            return;
        }
        if self.new_image_id.as_deref() == Some(self.old_image_id.as_str()) {
            debug!(image = %self.old_image_id, "old image is still current, keeping it");
            return;
        }
        match docker.remove_image(&self.old_image_id).await {
            Ok(()) => debug!(image = %self.old_image_id, "removed old image"),
            Err(e) => warn!(image = %self.old_image_id, error = %e, "failed to remove old image"),
        }
    }

    async fn roll_back<D: DockerClient>(
        &mut self,
        docker: &D,
        failure: UpdaterError,
    ) -> Result<TransactionOutcome, UpdaterError> {
        if let Err(e) = docker
            .rename_container(&self.container_id, &self.container_name)
            .await
        {
            return Err(self.down(format!("{failure}; rename back failed: {e}")));
        }
        if let Err(e) = docker.start_container(&self.container_id).await {
            return Err(self.down(format!("{failure}; restart failed: {e}")));
        }
        Ok(self.rolled_back(Step::Start, &failure))
    }

    fn abort(&mut self, reason: AbortReason) -> TransactionOutcome {
        self.phase = Phase::Aborted;
        debug!(container = %self.container_name, %reason, "replacement skipped");
        TransactionOutcome::Aborted(reason)
    }

    fn rolled_back(&mut self, step: Step, failure: &UpdaterError) -> TransactionOutcome {
        self.phase = Phase::RolledBack;
        info!(container = %self.container_name, %step, "original container restored");
        TransactionOutcome::RolledBack {
            step,
            reason: failure.to_string(),
        }
    }

    fn down(&mut self, reason: String) -> UpdaterError {
        self.phase = Phase::Down;
        UpdaterError::RollbackFailed {
            container: self.container_name.clone(),
            reason,
        }
    }

    fn step_error(&self, step: Step, err: &UpdaterError) -> UpdaterError {
        UpdaterError::EngineOperation {
            step,
            container: self.container_name.clone(),
            reason: err.to_string(),
        }
    }
}

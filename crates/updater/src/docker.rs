//! Docker API abstraction for testability.
//!
//! The [`DockerClient`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardDockerClient`] while tests use `MockDockerClient`.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────┐
//! │ Scheduler │──▶│ ReplacementTransaction│
//! └─────┬─────┘   └──────────┬───────────┘
//!       │                    │
//!       ▼                    ▼
//!         ┌─────────────┐
//!         │DockerClient │ (trait)
//!         └─────────────┘
//!            │       │
//!            ▼       ▼
//!      ┌───────┐ ┌──────┐
//!      │Bollard│ │ Mock │
//!      └───┬───┘ └──────┘
//!          │
//!          ▼
//!    Docker Daemon
//! ```
//!
//! # Container ID Validation
//!
//! All methods that accept container IDs perform validation before reaching the daemon:
//! - Must be 1-64 characters
//! - Must contain only ASCII hex digits ([0-9a-fA-F])
//!
//! # Configuration Preservation
//!
//! [`ContainerSnapshot`] carries the engine's own configuration models untouched.
//! [`ContainerSnapshot::blueprint_for`] swaps the image and nothing else, so a
//! replacement container gets the same environment, command, mounts, restart
//! policy, capabilities, labels and network endpoints as the one it replaces.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bollard::models::{ContainerConfig, EndpointSettings, HostConfig};
use futures_util::TryStreamExt;
use tracing::{debug, trace};

use orbitd_core::types::{ContainerDescriptor, ContainerState};

use crate::error::UpdaterError;
use crate::reference::ImageReference;

/// Validates a container ID before it reaches the engine.
///
/// Docker container IDs are 64-character hex strings (or shorter prefix forms).
fn validate_container_id(id: &str) -> Result<(), UpdaterError> {
    if id.is_empty() || id.len() > 64 {
        return Err(UpdaterError::DockerApi(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UpdaterError::DockerApi(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Full inspect result of a container, as needed to recreate it.
#[derive(Debug, Clone, Default)]
pub struct ContainerSnapshot {
    /// Full container ID.
    pub id: String,
    /// Container name without the leading `/`.
    pub name: String,
    /// Whether the engine reports the container as running.
    ///
    /// Docker keeps this set for paused and restarting containers.
    pub running: bool,
    /// Whether the container is paused.
    pub paused: bool,
    /// Whether the container is in a restart loop.
    pub restarting: bool,
    /// Local ID of the image the container runs.
    pub image_id: String,
    /// Container configuration (env, cmd, labels, image reference, ...).
    pub config: ContainerConfig,
    /// Host configuration (mounts, restart policy, capabilities, ...).
    pub host_config: Option<HostConfig>,
    /// Network endpoint settings keyed by network name.
    pub endpoints: HashMap<String, EndpointSettings>,
}

impl ContainerSnapshot {
    /// Whether the container is up and neither paused nor restarting.
    pub fn is_running(&self) -> bool {
        self.running && !self.paused && !self.restarting
    }

    /// Image reference string from the container configuration.
    pub fn image(&self) -> &str {
        self.config.image.as_deref().unwrap_or_default()
    }

    /// Creation parameters for a replacement running `image`.
    ///
    /// Everything is copied verbatim except the image reference.
    pub fn blueprint_for(&self, image: &str) -> ContainerBlueprint {
        let mut config = self.config.clone();
        config.image = Some(image.to_owned());
        ContainerBlueprint {
            name: self.name.clone(),
            config,
            host_config: self.host_config.clone(),
            endpoints: self.endpoints.clone(),
        }
    }
}

/// Creation parameters for [`DockerClient::run_container`].
#[derive(Debug, Clone, Default)]
pub struct ContainerBlueprint {
    /// Name to assign to the new container.
    pub name: String,
    /// Container configuration, image included.
    pub config: ContainerConfig,
    /// Host configuration.
    pub host_config: Option<HostConfig>,
    /// Network endpoints to attach at creation.
    pub endpoints: HashMap<String, EndpointSettings>,
}

/// Identity of a local image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    /// Local image ID (`sha256:...`), host-specific.
    pub id: String,
    /// Registry content digests (`repo@sha256:...`), stable across hosts.
    pub repo_digests: Vec<String>,
}

/// Trait abstracting Docker API operations.
///
/// All Docker API calls go through this trait, enabling testability via mocking.
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async contexts.
///
/// # Implementations
///
/// - [`BollardDockerClient`]: Production implementation using the `bollard` library
/// - `MockDockerClient`: Test implementation with scripted failures (available in tests only)
///
/// # Error Handling
///
/// - **404 errors**: Converted to `UpdaterError::ContainerNotFound`
/// - **Connection errors**: Wrapped as `UpdaterError::DockerConnection`
/// - **Pull failures**: Wrapped as `UpdaterError::PullFailed`
/// - **Everything else**: Wrapped as `UpdaterError::DockerApi`
pub trait DockerClient: Send + Sync + 'static {
    /// Lists running containers.
    ///
    /// Stopped containers are never updated, so they are not listed.
    fn list_containers(
        &self,
    ) -> impl Future<Output = Result<Vec<ContainerDescriptor>, UpdaterError>> + Send;

    /// Inspects a container.
    ///
    /// # Errors
    ///
    /// - `UpdaterError::ContainerNotFound`: Container does not exist (404)
    /// - `UpdaterError::DockerApi`: Invalid ID or other API errors
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerSnapshot, UpdaterError>> + Send;

    /// Stops a container with a 10-second grace period. The container is not removed.
    fn stop_container(&self, id: &str) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Starts an existing container.
    fn start_container(&self, id: &str) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Renames a container.
    fn rename_container(
        &self,
        id: &str,
        new_name: &str,
    ) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Removes a container, forcing it down if still running.
    fn remove_container(&self, id: &str) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Creates and starts a container, returning its ID.
    ///
    /// A container that was created but failed to start is removed again so
    /// its name is free for a rollback.
    fn run_container(
        &self,
        blueprint: &ContainerBlueprint,
    ) -> impl Future<Output = Result<String, UpdaterError>> + Send;

    /// Pulls an image, waiting until every layer is present.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::PullFailed`; nothing else has changed when it does.
    fn pull_image(
        &self,
        image: &ImageReference,
    ) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Inspects a local image by reference or ID.
    fn inspect_image(
        &self,
        image: &str,
    ) -> impl Future<Output = Result<ImageDetails, UpdaterError>> + Send;

    /// Removes a local image, pruning untagged parents.
    fn remove_image(&self, id: &str) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Checks Docker daemon connectivity.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::DockerConnection` if the daemon is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), UpdaterError>> + Send;
}

/// Production Docker client implementation using `bollard`.
///
/// Communicates with the Docker daemon via a Unix socket or TCP connection.
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async tasks.
///
/// # Connection Management
///
/// - Connection timeout: 120 seconds
/// - API version: Default (auto-negotiated)
/// - Socket path: Configurable (default: `DOCKER_HOST` or `/var/run/docker.sock`)
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// Connects to Docker using the local defaults (`DOCKER_HOST` or the platform socket).
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::DockerConnection` if the connection fails.
    pub fn connect_local() -> Result<Self, UpdaterError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            UpdaterError::DockerConnection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::DockerConnection` if the connection fails.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, UpdaterError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    UpdaterError::DockerConnection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to `socket_path`, or to the local defaults when it is empty.
    pub fn connect(socket_path: &str) -> Result<Self, UpdaterError> {
        if socket_path.is_empty() {
            Self::connect_local()
        } else {
            Self::connect_with_socket(socket_path)
        }
    }

    fn api_error(id: &str, action: &str, e: bollard::errors::Error) -> UpdaterError {
        if is_not_found(&e) {
            UpdaterError::ContainerNotFound(id.to_owned())
        } else {
            UpdaterError::DockerApi(format!("{action} failed for {id}: {e}"))
        }
    }
}

impl DockerClient for BollardDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerDescriptor>, UpdaterError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| UpdaterError::DockerApi(format!("list containers failed: {e}")))?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let name = container
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default();
            let state = container
                .state
                .as_deref()
                .map_or(ContainerState::Unknown, ContainerState::from_engine);

            result.push(ContainerDescriptor {
                id: container.id.unwrap_or_default(),
                name,
                image: container.image.unwrap_or_default(),
                image_id: container.image_id.unwrap_or_default(),
                labels: container.labels.unwrap_or_default(),
                state,
            });
        }

        Ok(result)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, UpdaterError> {
        validate_container_id(id)?;

        let details = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| Self::api_error(id, "inspect container", e))?;

        let name = details
            .name
            .map(|n| n.trim_start_matches('/').to_owned())
            .unwrap_or_default();
        let state = details.state.unwrap_or_default();
        let endpoints = details
            .network_settings
            .and_then(|n| n.networks)
            .unwrap_or_default();

        Ok(ContainerSnapshot {
            id: details.id.unwrap_or_else(|| id.to_owned()),
            name,
            running: state.running.unwrap_or(false),
            paused: state.paused.unwrap_or(false),
            restarting: state.restarting.unwrap_or(false),
            image_id: details.image.unwrap_or_default(),
            config: details.config.unwrap_or_default(),
            host_config: details.host_config,
            endpoints,
        })
    }

    async fn stop_container(&self, id: &str) -> Result<(), UpdaterError> {
        validate_container_id(id)?;

        use bollard::container::StopContainerOptions;

        self.docker
            .stop_container(id, Some(StopContainerOptions { t: 10 }))
            .await
            .map_err(|e| Self::api_error(id, "stop", e))
    }

    async fn start_container(&self, id: &str) -> Result<(), UpdaterError> {
        validate_container_id(id)?;

        use bollard::container::StartContainerOptions;

        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Self::api_error(id, "start", e))
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), UpdaterError> {
        validate_container_id(id)?;

        use bollard::container::RenameContainerOptions;

        self.docker
            .rename_container(id, RenameContainerOptions { name: new_name })
            .await
            .map_err(|e| Self::api_error(id, &format!("rename to '{new_name}'"), e))
    }

    async fn remove_container(&self, id: &str) -> Result<(), UpdaterError> {
        validate_container_id(id)?;

        use bollard::container::RemoveContainerOptions;

        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Self::api_error(id, "remove", e))
    }

    async fn run_container(&self, blueprint: &ContainerBlueprint) -> Result<String, UpdaterError> {
        use bollard::container::{Config, CreateContainerOptions, NetworkingConfig};

        let mut config: Config<String> = blueprint.config.clone().into();
        config.host_config = blueprint.host_config.clone();
        config.networking_config = Some(NetworkingConfig {
            endpoints_config: blueprint.endpoints.clone(),
        });

        let options = CreateContainerOptions {
            name: blueprint.name.clone(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| {
                UpdaterError::DockerApi(format!("create container '{}' failed: {e}", blueprint.name))
            })?;

        for warning in &created.warnings {
            debug!(container = %blueprint.name, warning = %warning, "engine warning on create");
        }

        if let Err(e) = self.start_container(&created.id).await {
            if let Err(remove_err) = self.remove_container(&created.id).await {
                debug!(
                    container = %blueprint.name,
                    error = %remove_err,
                    "failed to remove container that did not start"
                );
            }
            return Err(e);
        }

        Ok(created.id)
    }

    async fn pull_image(&self, image: &ImageReference) -> Result<(), UpdaterError> {
        use bollard::image::CreateImageOptions;

        let tag = image
            .digest()
            .or_else(|| image.tag())
            .unwrap_or(crate::reference::DEFAULT_TAG);
        let options = CreateImageOptions {
            from_image: image.name(),
            tag,
            ..Default::default()
        };

        self.docker
            .create_image(Some(options), None, None)
            .try_for_each(|info| {
                if let Some(status) = info.status {
                    trace!(image = %image, status = %status, "pull progress");
                }
                futures_util::future::ready(Ok(()))
            })
            .await
            .map_err(|e| UpdaterError::PullFailed {
                image: image.to_string(),
                reason: e.to_string(),
            })
    }

    async fn inspect_image(&self, image: &str) -> Result<ImageDetails, UpdaterError> {
        let details = self.docker.inspect_image(image).await.map_err(|e| {
            if is_not_found(&e) {
                UpdaterError::DockerApi(format!("no such image: {image}"))
            } else {
                UpdaterError::DockerApi(format!("inspect image failed for {image}: {e}"))
            }
        })?;

        Ok(ImageDetails {
            id: details.id.unwrap_or_default(),
            repo_digests: details.repo_digests.unwrap_or_default(),
        })
    }

    async fn remove_image(&self, id: &str) -> Result<(), UpdaterError> {
        use bollard::image::RemoveImageOptions;

        let removed = self
            .docker
            .remove_image(
                id,
                Some(RemoveImageOptions {
                    force: false,
                    noprune: false,
                }),
                None,
            )
            .await
            .map_err(|e| UpdaterError::DockerApi(format!("remove image failed for {id}: {e}")))?;

        for item in removed {
            if let Some(deleted) = item.deleted {
                debug!(image = %deleted, "removed image");
            }
            if let Some(untagged) = item.untagged {
                debug!(image = %untagged, "untagged image");
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), UpdaterError> {
        self.docker
            .ping()
            .await
            .map_err(|e| UpdaterError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// 테스트용 Mock Docker 클라이언트
///
/// 컨테이너와 이미지 상태를 메모리에 보관하고, 작업별로 실패를 주입할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    state: std::sync::Mutex<MockState>,
}

#[cfg(test)]
#[derive(Default)]
struct MockState {
    containers: Vec<ContainerSnapshot>,
    /// 로컬 이미지 (참조 문자열 또는 ID -> 상세)
    images: HashMap<String, ImageDetails>,
    /// 레지스트리에 있는 이미지 (참조 문자열 -> 상세)
    remote: HashMap<String, ImageDetails>,
    /// 작업명 -> 실패시킬 호출 순번 (0이면 항상 실패)
    failures: HashMap<&'static str, usize>,
    counts: HashMap<&'static str, usize>,
    calls: Vec<String>,
    created: Vec<ContainerBlueprint>,
    next_id: u64,
}

#[cfg(test)]
impl MockState {
    fn record(&mut self, op: &'static str, detail: String) -> Result<(), UpdaterError> {
        let count = self.counts.entry(op).or_insert(0);
        *count += 1;
        self.calls.push(format!("{op}:{detail}"));
        match self.failures.get(op) {
            Some(0) => Err(UpdaterError::DockerApi(format!("mock {op} failure"))),
            Some(n) if *n == *count => Err(UpdaterError::DockerApi(format!("mock {op} failure"))),
            _ => Ok(()),
        }
    }

    fn container_mut(&mut self, id: &str) -> Result<&mut ContainerSnapshot, UpdaterError> {
        self.containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))
    }
}

#[cfg(test)]
impl MockDockerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// 실행 중인 컨테이너를 추가합니다.
    pub fn with_container(self, snapshot: ContainerSnapshot) -> Self {
        self.lock().containers.push(snapshot);
        self
    }

    /// 로컬 이미지를 추가합니다.
    pub fn with_local_image(self, key: &str, details: ImageDetails) -> Self {
        self.lock().images.insert(key.to_owned(), details);
        self
    }

    /// pull 로 받을 수 있는 이미지를 추가합니다.
    pub fn with_remote_image(self, reference: &str, details: ImageDetails) -> Self {
        self.lock().remote.insert(reference.to_owned(), details);
        self
    }

    /// 해당 작업이 항상 실패하도록 설정합니다.
    pub fn failing(self, op: &'static str) -> Self {
        self.lock().failures.insert(op, 0);
        self
    }

    /// 해당 작업의 `nth`번째 호출만 실패하도록 설정합니다 (1부터 시작).
    pub fn failing_nth(self, op: &'static str, nth: usize) -> Self {
        self.lock().failures.insert(op, nth);
        self
    }

    /// 기록된 호출 목록 (`op:detail`)
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// 작업명으로 시작하는 호출 수
    pub fn count(&self, op: &str) -> usize {
        self.lock().counts.get(op).copied().unwrap_or(0)
    }

    /// 생성된 컨테이너 명세
    pub fn created(&self) -> Vec<ContainerBlueprint> {
        self.lock().created.clone()
    }

    /// 이름으로 컨테이너를 조회합니다.
    pub fn container_named(&self, name: &str) -> Option<ContainerSnapshot> {
        self.lock().containers.iter().find(|c| c.name == name).cloned()
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerDescriptor>, UpdaterError> {
        let mut state = self.lock();
        state.record("list_containers", String::new())?;
        Ok(state
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| ContainerDescriptor {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image().to_owned(),
                image_id: c.image_id.clone(),
                labels: c.config.labels.clone().unwrap_or_default(),
                state: ContainerState::Running,
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, UpdaterError> {
        let mut state = self.lock();
        state.record("inspect_container", id.to_owned())?;
        state.container_mut(id).map(|c| c.clone())
    }

    async fn stop_container(&self, id: &str) -> Result<(), UpdaterError> {
        let mut state = self.lock();
        state.record("stop_container", id.to_owned())?;
        state.container_mut(id)?.running = false;
        Ok(())
    }

    async fn start_container(&self, id: &str) -> Result<(), UpdaterError> {
        let mut state = self.lock();
        state.record("start_container", id.to_owned())?;
        state.container_mut(id)?.running = true;
        Ok(())
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), UpdaterError> {
        let mut state = self.lock();
        state.record("rename_container", format!("{id}:{new_name}"))?;
        if state.containers.iter().any(|c| c.name == new_name && c.id != id) {
            return Err(UpdaterError::DockerApi(format!("name '{new_name}' already in use")));
        }
        state.container_mut(id)?.name = new_name.to_owned();
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), UpdaterError> {
        let mut state = self.lock();
        state.record("remove_container", id.to_owned())?;
        state.container_mut(id)?;
        state.containers.retain(|c| c.id != id);
        Ok(())
    }

    async fn run_container(&self, blueprint: &ContainerBlueprint) -> Result<String, UpdaterError> {
        let mut state = self.lock();
        state.record("run_container", blueprint.name.clone())?;
        if state.containers.iter().any(|c| c.name == blueprint.name) {
            return Err(UpdaterError::DockerApi(format!(
                "name '{}' already in use",
                blueprint.name
            )));
        }
        state.next_id += 1;
        let id = format!("{:064x}", 0xc0ffee_u64 + state.next_id);
        let image = blueprint.config.image.clone().unwrap_or_default();
        let image_id = state
            .images
            .get(&image)
            .map(|i| i.id.clone())
            .unwrap_or_default();
        state.containers.push(ContainerSnapshot {
            id: id.clone(),
            name: blueprint.name.clone(),
            running: true,
            paused: false,
            restarting: false,
            image_id,
            config: blueprint.config.clone(),
            host_config: blueprint.host_config.clone(),
            endpoints: blueprint.endpoints.clone(),
        });
        state.created.push(blueprint.clone());
        Ok(id)
    }

    async fn pull_image(&self, image: &ImageReference) -> Result<(), UpdaterError> {
        let mut state = self.lock();
        let reference = image.to_string();
        state
            .record("pull_image", reference.clone())
            .map_err(|e| UpdaterError::PullFailed {
                image: reference.clone(),
                reason: e.to_string(),
            })?;
        let details = state
            .remote
            .get(&reference)
            .cloned()
            .ok_or_else(|| UpdaterError::PullFailed {
                image: reference.clone(),
                reason: "manifest unknown".to_owned(),
            })?;
        state.images.insert(details.id.clone(), details.clone());
        state.images.insert(reference, details);
        Ok(())
    }

    async fn inspect_image(&self, image: &str) -> Result<ImageDetails, UpdaterError> {
        let mut state = self.lock();
        state.record("inspect_image", image.to_owned())?;
        state
            .images
            .get(image)
            .cloned()
            .ok_or_else(|| UpdaterError::DockerApi(format!("no such image: {image}")))
    }

    async fn remove_image(&self, id: &str) -> Result<(), UpdaterError> {
        let mut state = self.lock();
        state.record("remove_image", id.to_owned())?;
        state.images.retain(|_, details| details.id != id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), UpdaterError> {
        self.lock()
            .record("ping", String::new())
            .map_err(|e| UpdaterError::DockerConnection(e.to_string()))
    }
}

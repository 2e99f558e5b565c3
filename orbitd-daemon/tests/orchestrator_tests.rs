//! Orchestrator lifecycle tests with fake engines.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orbitd_core::config::OrbitdConfig;
use orbitd_core::types::{ContainerDescriptor, ContainerState};
use orbitd_daemon::orchestrator::Orchestrator;
use orbitd_updater::{
    ContainerBlueprint, ContainerSnapshot, CycleReport, DockerClient, ImageDetails,
    ImageReference, RegistryClient, UpdaterError,
};
use tokio::sync::oneshot;

/// Engine with no containers; counts pings and listings.
#[derive(Default)]
struct IdleDocker {
    pings: AtomicUsize,
    listings: AtomicUsize,
    unreachable: bool,
}

fn untouched<T>(op: &str) -> Result<T, UpdaterError> {
    Err(UpdaterError::DockerApi(format!("unexpected {op}")))
}

impl DockerClient for IdleDocker {
    async fn list_containers(&self) -> Result<Vec<ContainerDescriptor>, UpdaterError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn inspect_container(&self, _id: &str) -> Result<ContainerSnapshot, UpdaterError> {
        untouched("inspect")
    }

    async fn stop_container(&self, _id: &str) -> Result<(), UpdaterError> {
        untouched("stop")
    }

    async fn start_container(&self, _id: &str) -> Result<(), UpdaterError> {
        untouched("start")
    }

    async fn rename_container(&self, _id: &str, _new_name: &str) -> Result<(), UpdaterError> {
        untouched("rename")
    }

    async fn remove_container(&self, _id: &str) -> Result<(), UpdaterError> {
        untouched("remove")
    }

    async fn run_container(&self, _blueprint: &ContainerBlueprint) -> Result<String, UpdaterError> {
        untouched("run")
    }

    async fn pull_image(&self, _image: &ImageReference) -> Result<(), UpdaterError> {
        untouched("pull")
    }

    async fn inspect_image(&self, _image: &str) -> Result<ImageDetails, UpdaterError> {
        untouched("inspect_image")
    }

    async fn remove_image(&self, _id: &str) -> Result<(), UpdaterError> {
        untouched("remove_image")
    }

    async fn ping(&self) -> Result<(), UpdaterError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(UpdaterError::DockerConnection("connection refused".to_owned()));
        }
        Ok(())
    }
}

struct EmptyRegistry;

impl RegistryClient for EmptyRegistry {
    async fn list_tags(&self, _reference: &ImageReference) -> Result<Vec<String>, UpdaterError> {
        Ok(Vec::new())
    }
}

/// Engine with a single `web` container whose image has a newer build.
///
/// Stopping the container fires `on_stop`, so a shutdown arrives while the
/// replacement is in flight.
struct SwapDocker {
    /// Container ID -> (name, running).
    containers: Mutex<HashMap<String, (String, bool)>>,
    on_stop: Mutex<Option<oneshot::Sender<()>>>,
    next_id: AtomicUsize,
}

const WEB_ID: &str = "web-original";
const OLD_IMAGE: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";
const NEW_IMAGE: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";

impl SwapDocker {
    fn new(on_stop: oneshot::Sender<()>) -> Self {
        Self {
            containers: Mutex::new(HashMap::from([(
                WEB_ID.to_owned(),
                ("web".to_owned(), true),
            )])),
            on_stop: Mutex::new(Some(on_stop)),
            next_id: AtomicUsize::new(0),
        }
    }

    fn named(&self, name: &str) -> Option<(String, bool)> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|(_, (n, _))| n == name)
            .map(|(id, (_, running))| (id.clone(), *running))
    }

    fn set_running(&self, id: &str, running: bool) -> Result<(), UpdaterError> {
        let mut containers = self.containers.lock().unwrap();
        let entry = containers
            .get_mut(id)
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))?;
        entry.1 = running;
        Ok(())
    }
}

impl DockerClient for SwapDocker {
    async fn list_containers(&self) -> Result<Vec<ContainerDescriptor>, UpdaterError> {
        Ok(vec![ContainerDescriptor {
            id: WEB_ID.to_owned(),
            name: "web".to_owned(),
            image: "nginx:1.25".to_owned(),
            image_id: OLD_IMAGE.to_owned(),
            labels: HashMap::new(),
            state: ContainerState::Running,
        }])
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, UpdaterError> {
        let containers = self.containers.lock().unwrap();
        let (name, running) = containers
            .get(id)
            .cloned()
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))?;
        Ok(ContainerSnapshot {
            id: id.to_owned(),
            name,
            running,
            image_id: OLD_IMAGE.to_owned(),
            ..Default::default()
        })
    }

    async fn stop_container(&self, id: &str) -> Result<(), UpdaterError> {
        self.set_running(id, false)?;
        if let Some(tx) = self.on_stop.lock().unwrap().take() {
            let _ = tx.send(());
        }
        Ok(())
    }

    async fn start_container(&self, id: &str) -> Result<(), UpdaterError> {
        self.set_running(id, true)
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), UpdaterError> {
        // Give the shutdown branch a chance to fire mid-transaction.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut containers = self.containers.lock().unwrap();
        let entry = containers
            .get_mut(id)
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))?;
        entry.0 = new_name.to_owned();
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), UpdaterError> {
        self.containers.lock().unwrap().remove(id);
        Ok(())
    }

    async fn run_container(&self, blueprint: &ContainerBlueprint) -> Result<String, UpdaterError> {
        let id = format!("web-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.containers
            .lock()
            .unwrap()
            .insert(id.clone(), (blueprint.name.clone(), true));
        Ok(id)
    }

    async fn pull_image(&self, _image: &ImageReference) -> Result<(), UpdaterError> {
        Ok(())
    }

    async fn inspect_image(&self, image: &str) -> Result<ImageDetails, UpdaterError> {
        let id = if image == OLD_IMAGE { OLD_IMAGE } else { NEW_IMAGE };
        Ok(ImageDetails {
            id: id.to_owned(),
            repo_digests: Vec::new(),
        })
    }

    async fn remove_image(&self, _id: &str) -> Result<(), UpdaterError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), UpdaterError> {
        Ok(())
    }
}

fn orchestrator(
    config: OrbitdConfig,
    docker: IdleDocker,
) -> (Orchestrator<IdleDocker, EmptyRegistry>, Arc<IdleDocker>) {
    let docker = Arc::new(docker);
    let orchestrator =
        Orchestrator::with_clients(config, Arc::clone(&docker), Arc::new(EmptyRegistry))
            .expect("orchestrator should build");
    (orchestrator, docker)
}

#[tokio::test]
async fn test_run_once_reports_empty_cycle() {
    // Given
    let (orchestrator, docker) = orchestrator(OrbitdConfig::default(), IdleDocker::default());

    // When
    let report = orchestrator.run_once().await.expect("cycle should succeed");

    // Then
    assert_eq!(report, CycleReport::default());
    assert_eq!(docker.listings.load(Ordering::SeqCst), 1);
    assert_eq!(docker.pings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_once_shutdown_lets_replacement_finish() {
    // Given: shutdown is requested as soon as the container is stopped
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let docker = Arc::new(SwapDocker::new(stop_tx));
    let orchestrator =
        Orchestrator::with_clients(OrbitdConfig::default(), Arc::clone(&docker), Arc::new(EmptyRegistry))
            .expect("orchestrator should build");

    // When
    let report = orchestrator
        .run_once_until(async {
            let _ = stop_rx.await;
        })
        .await
        .expect("cycle should complete");

    // Then: the replacement committed under the original name
    assert_eq!(report.updated, 1);
    assert_eq!(report.down, 0);
    let (id, running) = docker.named("web").expect("web should exist");
    assert_ne!(id, WEB_ID);
    assert!(running);
    assert!(docker.named("web-orbitd-old").is_none());
}

#[tokio::test]
async fn test_run_until_manages_pid_file_and_scheduler() {
    // Given: a PID file path and a shutdown trigger
    let dir = tempfile::tempdir().expect("tempdir");
    let pid_path = dir.path().join("orbitd.pid");
    let mut config = OrbitdConfig::default();
    config.general.pid_file = pid_path.display().to_string();
    let (orchestrator, docker) = orchestrator(config, IdleDocker::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    // When: the daemon runs until the trigger fires
    let check_path = pid_path.clone();
    let observer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let existed = check_path.exists();
        let _ = shutdown_tx.send(());
        existed
    });
    orchestrator
        .run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
        .expect("daemon should shut down cleanly");

    // Then: PID file existed while running and is gone afterwards
    assert!(observer.await.expect("observer task"));
    assert!(!pid_path.exists());
    assert!(docker.listings.load(Ordering::SeqCst) >= 1, "first cycle runs immediately");
}

#[tokio::test]
async fn test_run_until_joins_uptime_updater() {
    // Given: metrics enabled, so the uptime updater runs alongside the scheduler
    let mut config = OrbitdConfig::default();
    config.metrics.enabled = true;
    let (orchestrator, docker) = orchestrator(config, IdleDocker::default());

    // When: shutdown arrives after the first cycle
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run_until(tokio::time::sleep(Duration::from_millis(100))),
    )
    .await
    .expect("both background tasks should stop on shutdown");

    // Then
    assert!(result.is_ok());
    assert!(docker.listings.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_unreachable_docker_is_not_fatal() {
    // Given
    let docker = IdleDocker {
        unreachable: true,
        ..Default::default()
    };
    let (orchestrator, docker) = orchestrator(OrbitdConfig::default(), docker);

    // When
    let result = orchestrator.run_until(async {}).await;

    // Then
    assert!(result.is_ok());
    assert_eq!(docker.pings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_existing_pid_file_prevents_start() {
    // Given
    let dir = tempfile::tempdir().expect("tempdir");
    let pid_path = dir.path().join("orbitd.pid");
    std::fs::write(&pid_path, "4242").expect("write PID file");
    let mut config = OrbitdConfig::default();
    config.general.pid_file = pid_path.display().to_string();
    let (orchestrator, docker) = orchestrator(config, IdleDocker::default());

    // When
    let result = orchestrator.run_until(async {}).await;

    // Then
    let err = result.unwrap_err().to_string();
    assert!(err.contains("4242"), "got: {err}");
    assert_eq!(docker.listings.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), "4242");
}

//! 업데이트 스케줄러 -- 주기적으로 컨테이너를 열거하고 하나씩 업데이트
//!
//! [`Scheduler`]는 시작 즉시 한 주기를 실행하고, 이후 설정된 간격마다 반복합니다.
//! 한 주기 안에서 컨테이너는 목록 순서대로 하나씩 처리되며, 컨테이너 사이에는
//! 고정된 간격을 두어 Docker API 부하를 줄입니다.
//!
//! # 컨테이너 처리 흐름
//! ```text
//! list_containers
//!     │  (컨테이너마다, 순차)
//!     ▼
//! LabelFilter ─▶ ImageReference::parse ─▶ PolicyResolver::decide
//!     ─▶ before digest ─▶ pull (timeout) ─▶ after digest
//!     ─▶ digest::changed ─▶ ReplacementTransaction
//! ```
//!
//! 컨테이너 단위 에러는 여기서 잡아 기록하며 주기를 중단시키지 않습니다.
//! 주기 수준의 에러는 컨테이너 목록 조회 실패뿐입니다.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use orbitd_core::metrics as m;
use orbitd_core::types::ContainerDescriptor;

use crate::config::UpdaterConfig;
use crate::digest;
use crate::docker::DockerClient;
use crate::error::UpdaterError;
use crate::identity::{HostnameSelfDetector, SelfDetector};
use crate::policy::{LabelFilter, PolicyResolver};
use crate::reference::ImageReference;
use crate::registry::RegistryClient;
use crate::transaction::{ReplacementTransaction, TransactionOutcome};

/// 한 주기의 처리 결과 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 필터를 통과해 검사한 컨테이너 수
    pub checked: usize,
    /// 레이블, 잘못된 참조, 중단된 트랜잭션으로 건너뛴 수
    pub skipped: usize,
    /// 이미 최신인 컨테이너 수
    pub up_to_date: usize,
    /// 교체에 성공한 수
    pub updated: usize,
    /// 교체에 실패했지만 원래 컨테이너로 복구된 수
    pub rolled_back: usize,
    /// 상태 변경 없이 실패한 수 (pull 실패 등)
    pub failed: usize,
    /// 롤백까지 실패해 내려간 수
    pub down: usize,
}

/// 컨테이너 하나의 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerOutcome {
    UpToDate,
    Updated,
    RolledBack,
    Skipped,
}

/// 업데이트 스케줄러
///
/// 설정은 생성 시 값으로 전달되며, 클라이언트는 `Arc`로만 공유됩니다.
/// 주기는 겹치지 않으므로 내부 잠금이 필요 없습니다.
pub struct Scheduler<D: DockerClient, R: RegistryClient> {
    config: UpdaterConfig,
    docker: Arc<D>,
    resolver: PolicyResolver<R>,
    filter: LabelFilter,
    detector: Arc<dyn SelfDetector>,
}

impl<D: DockerClient, R: RegistryClient> Scheduler<D, R> {
    /// 새 스케줄러를 생성합니다.
    ///
    /// 자기 컨테이너 판별은 기본적으로 호스트 이름을 사용합니다.
    pub fn new(config: UpdaterConfig, docker: Arc<D>, registry: Arc<R>) -> Self {
        let resolver = PolicyResolver::new(registry, config.policy, config.tag_list_timeout);
        let filter = LabelFilter::new(config.require_label);
        Self {
            config,
            docker,
            resolver,
            filter,
            detector: Arc::new(HostnameSelfDetector::from_environment()),
        }
    }

    /// 자기 컨테이너 판별기를 교체합니다.
    pub fn with_self_detector(mut self, detector: Arc<dyn SelfDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// 취소될 때까지 주기를 반복합니다.
    ///
    /// 첫 주기는 즉시 실행됩니다. 주기가 간격보다 오래 걸리면 다음 주기는
    /// 이전 주기가 끝난 뒤로 밀리며, 겹쳐 실행되지 않습니다.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            policy = %self.config.policy,
            cleanup = self.config.cleanup,
            require_label = self.config.require_label,
            "update scheduler started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_cycle(&cancel).await {
                error!(error = %e, "update cycle failed");
            }
        }

        info!("update scheduler stopped");
    }

    /// 한 주기를 실행합니다.
    ///
    /// # Errors
    ///
    /// 컨테이너 목록 조회 실패만 반환합니다. 컨테이너 단위 에러는 집계에 반영됩니다.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, UpdaterError> {
        let started = Instant::now();
        let containers = self.docker.list_containers().await?;
        let mut report = CycleReport::default();
        let mut processed_any = false;

        debug!(containers = containers.len(), "update cycle started");

        for container in &containers {
            if cancel.is_cancelled() {
                info!("update cycle cancelled");
                break;
            }

            if !self.filter.allows(container) {
                debug!(container = %container.name, "container not monitored, skipping");
                report.skipped += 1;
                continue;
            }

            if processed_any && !self.pace(cancel).await {
                info!("update cycle cancelled");
                break;
            }
            processed_any = true;
            report.checked += 1;

            match self.process(container, cancel).await {
                Ok(ContainerOutcome::UpToDate) => report.up_to_date += 1,
                Ok(ContainerOutcome::Updated) => {
                    report.updated += 1;
                    metrics::counter!(m::UPDATER_UPDATES_TOTAL).increment(1);
                }
                Ok(ContainerOutcome::RolledBack) => {
                    report.rolled_back += 1;
                    metrics::counter!(m::UPDATER_ROLLBACKS_TOTAL).increment(1);
                }
                Ok(ContainerOutcome::Skipped) => report.skipped += 1,
                Err(UpdaterError::Cancelled) => {
                    info!(container = %container.name, "update cycle cancelled");
                    break;
                }
                Err(e @ UpdaterError::MalformedReference { .. }) => {
                    warn!(
                        container = %container.name,
                        image = %container.image,
                        error = %e,
                        "cannot update container with this image reference, skipping"
                    );
                    report.skipped += 1;
                }
                Err(e @ UpdaterError::RollbackFailed { .. }) => {
                    error!(
                        container = %container.name,
                        image = %container.image,
                        phase = e.phase_name(),
                        error = %e,
                        "container is DOWN, manual intervention required"
                    );
                    report.down += 1;
                    metrics::counter!(m::UPDATER_CONTAINERS_DOWN_TOTAL).increment(1);
                }
                Err(e) => {
                    warn!(
                        container = %container.name,
                        image = %container.image,
                        phase = e.phase_name(),
                        error = %e,
                        "container update failed, will retry next cycle"
                    );
                    report.failed += 1;
                    metrics::counter!(m::UPDATER_FAILURES_TOTAL, m::LABEL_PHASE => e.phase_name())
                        .increment(1);
                }
            }
        }

        metrics::counter!(m::UPDATER_CYCLES_TOTAL).increment(1);
        metrics::histogram!(m::UPDATER_CYCLE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        info!(
            checked = report.checked,
            skipped = report.skipped,
            up_to_date = report.up_to_date,
            updated = report.updated,
            rolled_back = report.rolled_back,
            failed = report.failed,
            down = report.down,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "update cycle finished"
        );

        Ok(report)
    }

    /// 컨테이너 사이 간격을 둡니다. 취소되면 `false`를 반환합니다.
    async fn pace(&self, cancel: &CancellationToken) -> bool {
        if self.config.pacing.is_zero() {
            return true;
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.pacing) => true,
        }
    }

    async fn process(
        &self,
        container: &ContainerDescriptor,
        cancel: &CancellationToken,
    ) -> Result<ContainerOutcome, UpdaterError> {
        let current = ImageReference::parse(&container.image)?;
        let decision = self.resolver.decide(container, &current, cancel).await;
        metrics::counter!(
            m::UPDATER_CONTAINERS_CHECKED_TOTAL,
            m::LABEL_POLICY => decision.policy.as_str()
        )
        .increment(1);

        let target = decision.target;
        let before = self.running_digest(container, &target).await;

        self.pull(&target, cancel).await?;

        let target_image = target.to_string();
        let pulled = self.docker.inspect_image(&target_image).await?;
        let after = pulled.content_digest(&target).ok_or_else(|| {
            UpdaterError::DockerApi(format!("pulled image '{target_image}' has no identity"))
        })?;

        if !decision.changed && !digest::changed(before.as_deref(), &after) {
            debug!(container = %container.name, image = %target_image, "image already up to date");
            return Ok(ContainerOutcome::UpToDate);
        }

        info!(
            container = %container.name,
            from = %container.image,
            to = %target_image,
            policy = %decision.policy,
            "updating container"
        );

        let mut transaction = ReplacementTransaction::new(container, target_image)
            .with_cleanup(self.config.cleanup)
            .with_new_image_id(pulled.id);

        match transaction
            .execute(self.docker.as_ref(), self.detector.as_ref(), cancel)
            .await?
        {
            TransactionOutcome::Committed { new_container_id } => {
                info!(
                    container = %container.name,
                    new_id = %new_container_id,
                    "container updated"
                );
                Ok(ContainerOutcome::Updated)
            }
            TransactionOutcome::RolledBack { step, reason } => {
                warn!(
                    container = %container.name,
                    image = %container.image,
                    phase = step.as_str(),
                    error = %reason,
                    "update failed, original container restored"
                );
                Ok(ContainerOutcome::RolledBack)
            }
            TransactionOutcome::Aborted(reason) => {
                info!(container = %container.name, %reason, "update skipped");
                Ok(ContainerOutcome::Skipped)
            }
        }
    }

    /// 컨테이너가 현재 실행 중인 이미지의 다이제스트
    async fn running_digest(
        &self,
        container: &ContainerDescriptor,
        target: &ImageReference,
    ) -> Option<String> {
        if container.image_id.is_empty() {
            return None;
        }
        match self.docker.inspect_image(&container.image_id).await {
            Ok(details) => details.content_digest(target),
            Err(e) => {
                debug!(container = %container.name, error = %e, "running image not inspectable");
                None
            }
        }
    }

    async fn pull(
        &self,
        target: &ImageReference,
        cancel: &CancellationToken,
    ) -> Result<(), UpdaterError> {
        debug!(image = %target, "pulling image");
        tokio::select! {
            _ = cancel.cancelled() => Err(UpdaterError::Cancelled),
            result = tokio::time::timeout(self.config.pull_timeout, self.docker.pull_image(target)) => {
                result.map_err(|_| UpdaterError::PullFailed {
                    image: target.to_string(),
                    reason: format!("timed out after {}s", self.config.pull_timeout.as_secs()),
                })?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use bollard::models::ContainerConfig;

    use super::*;
    use crate::config::UpdaterConfigBuilder;
    use crate::docker::{ContainerSnapshot, ImageDetails, MockDockerClient};
    use crate::policy::{LABEL_ENABLE, LABEL_POLICY, UpdatePolicy};
    use crate::registry::MockRegistryClient;

    fn digest_of(c: char) -> String {
        format!("sha256:{}", c.to_string().repeat(64))
    }

    fn running(id: &str, name: &str, image: &str, image_id: &str, labels: &[(&str, &str)]) -> ContainerSnapshot {
        ContainerSnapshot {
            id: id.to_owned(),
            name: name.to_owned(),
            running: true,
            paused: false,
            restarting: false,
            image_id: image_id.to_owned(),
            config: ContainerConfig {
                image: Some(image.to_owned()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                        .collect::<HashMap<_, _>>(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn image(id: char, repo: &str, digest: char) -> ImageDetails {
        ImageDetails {
            id: digest_of(id),
            repo_digests: vec![format!("{repo}@{}", digest_of(digest))],
        }
    }

    fn config(policy: UpdatePolicy) -> UpdaterConfig {
        UpdaterConfigBuilder::new()
            .policy(policy)
            .pacing(Duration::ZERO)
            .build()
            .unwrap()
    }

    fn scheduler(
        docker: MockDockerClient,
        registry: MockRegistryClient,
        config: UpdaterConfig,
    ) -> (Scheduler<MockDockerClient, MockRegistryClient>, Arc<MockDockerClient>) {
        let docker = Arc::new(docker);
        let scheduler = Scheduler::new(config, Arc::clone(&docker), Arc::new(registry))
            .with_self_detector(Arc::new(|_: &str| false));
        (scheduler, docker)
    }

    #[tokio::test]
    async fn minor_policy_updates_to_newest_minor() {
        let docker = MockDockerClient::new()
            .with_container(running("aaa111", "app", "myapp:1.2.3", &digest_of('1'), &[(LABEL_POLICY, "minor")]))
            .with_local_image(&digest_of('1'), image('1', "myapp", 'a'))
            .with_remote_image("myapp:1.3.0", image('2', "myapp", 'b'));
        let registry = MockRegistryClient::new()
            .with_tags("library/myapp", &["1.2.3", "1.2.4", "1.3.0", "2.0.0", "dev"]);
        let (scheduler, docker) = scheduler(docker, registry, config(UpdatePolicy::Digest));

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.updated, 1);
        let app = docker.container_named("app").unwrap();
        assert_eq!(app.image(), "myapp:1.3.0");
        assert!(app.running);
    }

    #[tokio::test]
    async fn disabled_container_is_never_pulled() {
        let docker = MockDockerClient::new()
            .with_container(running("bbb222", "db", "postgres:15", &digest_of('1'), &[(LABEL_ENABLE, "false")]))
            .with_remote_image("postgres:15", image('2', "postgres", 'b'));
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.checked, 0);
        assert_eq!(docker.count("pull_image"), 0);
    }

    #[tokio::test]
    async fn require_label_mode_skips_unlabeled() {
        let docker = MockDockerClient::new()
            .with_container(running("ccc333", "web", "nginx:1.25", &digest_of('1'), &[]))
            .with_remote_image("nginx:1.25", image('2', "nginx", 'b'));
        let mut cfg = config(UpdatePolicy::Digest);
        cfg.require_label = true;
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), cfg);

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(docker.count("pull_image"), 0);
    }

    #[tokio::test]
    async fn equal_digests_create_no_transaction() {
        let docker = MockDockerClient::new()
            .with_container(running("ddd444", "cache", "redis:7", &digest_of('1'), &[]))
            .with_local_image(&digest_of('1'), image('1', "redis", 'a'))
            .with_remote_image("redis:7", image('1', "redis", 'a'));
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.up_to_date, 1);
        assert_eq!(docker.count("pull_image"), 1);
        assert_eq!(docker.count("stop_container"), 0);
    }

    #[tokio::test]
    async fn rebuilt_tag_is_replaced_under_digest_policy() {
        let docker = MockDockerClient::new()
            .with_container(running("eee555", "cache", "redis:7", &digest_of('1'), &[]))
            .with_local_image(&digest_of('1'), image('1', "redis", 'a'))
            .with_remote_image("redis:7", image('2', "redis", 'b'));
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(docker.count("remove_image"), 1);
    }

    #[tokio::test]
    async fn pull_failure_is_counted_and_cycle_continues() {
        let docker = MockDockerClient::new()
            .with_container(running("fff666", "broken", "ghost:1", &digest_of('1'), &[]))
            .with_container(running("abc777", "cache", "redis:7", &digest_of('3'), &[]))
            .with_local_image(&digest_of('3'), image('3', "redis", 'c'))
            .with_remote_image("redis:7", image('3', "redis", 'c'));
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.up_to_date, 1);
        assert_eq!(report.checked, 2);
        assert_eq!(docker.count("stop_container"), 0);
    }

    #[tokio::test]
    async fn untagged_image_id_is_skipped() {
        let docker = MockDockerClient::new()
            .with_container(running("abc888", "adhoc", &digest_of('9'), &digest_of('9'), &[]));
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(docker.count("pull_image"), 0);
    }

    #[tokio::test]
    async fn rollback_failure_is_counted_as_down() {
        let docker = MockDockerClient::new()
            .with_container(running("abc999", "db", "postgres:15", &digest_of('1'), &[]))
            .with_remote_image("postgres:15", image('2', "postgres", 'b'))
            .failing("run_container")
            .failing("start_container");
        let (scheduler, _docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));

        let report = scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.down, 1);
    }

    #[tokio::test]
    async fn list_failure_fails_the_cycle() {
        let docker = MockDockerClient::new().failing("list_containers");
        let (scheduler, _docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));

        assert!(scheduler.run_cycle(&CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn cancelled_cycle_processes_nothing() {
        let docker = MockDockerClient::new()
            .with_container(running("abcaaa", "cache", "redis:7", &digest_of('1'), &[]))
            .with_remote_image("redis:7", image('2', "redis", 'b'));
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = scheduler.run_cycle(&cancel).await.unwrap();

        assert_eq!(report, CycleReport::default());
        assert_eq!(docker.count("pull_image"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_fires_immediately_and_stops_on_cancel() {
        let docker = MockDockerClient::new();
        let (scheduler, docker) = scheduler(docker, MockRegistryClient::new(), config(UpdatePolicy::Digest));
        let scheduler = Arc::new(scheduler);
        let cancel = CancellationToken::new();

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(docker.count("list_containers"), 1);

        tokio::time::sleep(Duration::from_secs(12 * 3600)).await;
        assert_eq!(docker.count("list_containers"), 2);

        cancel.cancel();
        handle.await.unwrap();
    }
}

//! 업데이터 설정
//!
//! [`UpdaterConfig`]는 core의 [`UpdateConfig`](orbitd_core::config::UpdateConfig)를
//! 기반으로 스케줄러가 직접 사용하는 타입화된 설정을 제공합니다.
//! 문자열 정책은 [`UpdatePolicy`]로, 초/밀리초 값은 [`Duration`]으로 변환됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use orbitd_core::config::OrbitdConfig;
//! use orbitd_updater::config::UpdaterConfig;
//!
//! let core_config = OrbitdConfig::default();
//! let config = UpdaterConfig::from_core(&core_config.updater);
//! ```

use std::time::Duration;

use crate::error::UpdaterError;
use crate::policy::UpdatePolicy;

/// 설정 상한값 상수
const MAX_INTERVAL: Duration = Duration::from_secs(30 * 24 * 3600);
const MAX_PACING: Duration = Duration::from_secs(60);
const MAX_TAG_LIST_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_PULL_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// 업데이터 설정
///
/// 스케줄러 생성 시 값으로 전달되며, 프로세스 전역 상태를 두지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// 전역 업데이트 정책
    pub policy: UpdatePolicy,
    /// 업데이트 주기
    pub interval: Duration,
    /// 교체 성공 후 이전 이미지 삭제 여부
    pub cleanup: bool,
    /// `orbitd.enable=true` 레이블이 있는 컨테이너만 감시
    pub require_label: bool,
    /// 컨테이너 간 처리 간격
    pub pacing: Duration,
    /// 레지스트리 태그 조회 타임아웃
    pub tag_list_timeout: Duration,
    /// 이미지 pull 타임아웃
    pub pull_timeout: Duration,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            policy: UpdatePolicy::Digest,
            interval: Duration::from_secs(12 * 3600),
            cleanup: true,
            require_label: false,
            pacing: Duration::from_secs(1),
            tag_list_timeout: Duration::from_secs(10),
            pull_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl UpdaterConfig {
    /// core의 `UpdateConfig`에서 업데이터 설정을 생성합니다.
    ///
    /// 정책 문자열은 core 검증을 통과한 값이라고 가정하며, 알 수 없는 값은 `Digest`가 됩니다.
    pub fn from_core(core: &orbitd_core::config::UpdateConfig) -> Self {
        Self {
            policy: UpdatePolicy::from_label(&core.policy),
            interval: Duration::from_secs(core.interval_secs),
            cleanup: core.cleanup,
            require_label: core.require_label,
            pacing: Duration::from_millis(core.pacing_ms),
            tag_list_timeout: Duration::from_secs(core.tag_list_timeout_secs),
            pull_timeout: Duration::from_secs(core.pull_timeout_secs),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), UpdaterError> {
        check_duration("interval", self.interval, Duration::from_secs(1), MAX_INTERVAL)?;
        check_duration("pacing", self.pacing, Duration::ZERO, MAX_PACING)?;
        check_duration(
            "tag_list_timeout",
            self.tag_list_timeout,
            Duration::from_secs(1),
            MAX_TAG_LIST_TIMEOUT,
        )?;
        check_duration(
            "pull_timeout",
            self.pull_timeout,
            Duration::from_secs(1),
            MAX_PULL_TIMEOUT,
        )?;
        Ok(())
    }
}

fn check_duration(
    field: &str,
    value: Duration,
    min: Duration,
    max: Duration,
) -> Result<(), UpdaterError> {
    if value < min || value > max {
        return Err(UpdaterError::Config {
            field: field.to_owned(),
            reason: format!("must be {min:?}-{max:?}, got {value:?}"),
        });
    }
    Ok(())
}

/// 업데이터 설정 빌더
#[derive(Default)]
pub struct UpdaterConfigBuilder {
    config: UpdaterConfig,
}

impl UpdaterConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 전역 정책을 설정합니다.
    pub fn policy(mut self, policy: UpdatePolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// 업데이트 주기를 설정합니다.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// 이전 이미지 삭제 여부를 설정합니다.
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.config.cleanup = cleanup;
        self
    }

    /// require-label 모드를 설정합니다.
    pub fn require_label(mut self, require: bool) -> Self {
        self.config.require_label = require;
        self
    }

    /// 컨테이너 간 처리 간격을 설정합니다.
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// 태그 조회 타임아웃을 설정합니다.
    pub fn tag_list_timeout(mut self, timeout: Duration) -> Self {
        self.config.tag_list_timeout = timeout;
        self
    }

    /// pull 타임아웃을 설정합니다.
    pub fn pull_timeout(mut self, timeout: Duration) -> Self {
        self.config.pull_timeout = timeout;
        self
    }

    /// 설정을 검증하고 `UpdaterConfig`를 생성합니다.
    pub fn build(self) -> Result<UpdaterConfig, UpdaterError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//! 업데이트 정책 -- 컨테이너별 정책 결정 및 대상 이미지 계산
//!
//! [`UpdatePolicy`]는 어떤 새 이미지 버전을 허용할지 정의합니다.
//! [`LabelFilter`]는 레이블로 감시 대상 컨테이너를 거르고,
//! [`PolicyResolver`]는 레지스트리 태그 목록과 [`version::resolve`](crate::version::resolve)를
//! 이용해 컨테이너별 대상 이미지를 계산합니다.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use orbitd_core::types::ContainerDescriptor;

use crate::error::UpdaterError;
use crate::reference::ImageReference;
use crate::registry::RegistryClient;
use crate::version::{parse_tag_version, resolve};

/// 감시 여부 레이블 (`"false"`이면 제외)
pub const LABEL_ENABLE: &str = "orbitd.enable";

/// 컨테이너별 정책 재정의 레이블
pub const LABEL_POLICY: &str = "orbitd.policy";

/// 업데이트 정책
///
/// 닫힌 열거형이며 문자열 매핑은 [`UpdatePolicy::from_label`]로 전체 함수입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    /// 같은 태그를 다시 pull 하여 다이제스트 변경만 감지
    #[default]
    Digest,
    /// 같은 major.minor 안에서 더 높은 patch
    Patch,
    /// 같은 major 안에서 더 높은 minor.patch
    Minor,
    /// 더 높은 모든 버전
    Major,
}

impl UpdatePolicy {
    /// 문자열을 정책으로 변환합니다. 알 수 없는 값은 `Digest`입니다.
    pub fn from_label(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// 정책명을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Digest => "digest",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }

    /// semver 태그 조회가 필요한 정책인지 확인합니다.
    pub fn is_semver(&self) -> bool {
        !matches!(self, Self::Digest)
    }
}

impl FromStr for UpdatePolicy {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digest" => Ok(Self::Digest),
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(UpdaterError::Config {
                field: "policy".to_owned(),
                reason: format!("unknown policy '{other}'"),
            }),
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 레이블 기반 감시 대상 필터
///
/// `orbitd.enable=false`인 컨테이너는 항상 제외됩니다.
/// require-label 모드에서는 `orbitd.enable=true`인 컨테이너만 포함됩니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelFilter {
    require_label: bool,
}

impl LabelFilter {
    /// 새 필터를 생성합니다.
    pub fn new(require_label: bool) -> Self {
        Self { require_label }
    }

    /// 컨테이너가 감시 대상인지 확인합니다.
    pub fn allows(&self, container: &ContainerDescriptor) -> bool {
        let enable = container
            .label(LABEL_ENABLE)
            .map(|v| v.trim().to_ascii_lowercase());
        match enable.as_deref() {
            Some("false") => false,
            Some("true") => true,
            _ => !self.require_label,
        }
    }
}

/// 컨테이너 하나에 대한 정책 결정 결과
///
/// 한 주기 안에서 생성되고 소비됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDecision {
    /// 적용된 정책
    pub policy: UpdatePolicy,
    /// pull 할 대상 이미지
    pub target: ImageReference,
    /// 대상이 현재 이미지와 다른 태그인지 여부
    pub changed: bool,
}

/// 정책 결정기
///
/// 레지스트리 호출은 시간 제한이 걸려 있으며, 어떤 실패도 주기를 중단시키지 않습니다.
/// 실패하면 해당 컨테이너는 이번 주기에 다이제스트 정책으로 동작합니다.
pub struct PolicyResolver<R: RegistryClient> {
    registry: Arc<R>,
    global: UpdatePolicy,
    tag_list_timeout: Duration,
}

impl<R: RegistryClient> PolicyResolver<R> {
    /// 새 결정기를 생성합니다.
    pub fn new(registry: Arc<R>, global: UpdatePolicy, tag_list_timeout: Duration) -> Self {
        Self {
            registry,
            global,
            tag_list_timeout,
        }
    }

    /// 컨테이너에 적용할 정책을 반환합니다.
    ///
    /// 유효한 `orbitd.policy` 레이블이 있으면 그 값을, 아니면 전역 정책을 사용합니다.
    pub fn policy_for(&self, container: &ContainerDescriptor) -> UpdatePolicy {
        match container.label(LABEL_POLICY) {
            Some(value) => value.parse().unwrap_or_else(|_| {
                debug!(
                    container = %container.name,
                    value,
                    "ignoring invalid policy label, using global policy"
                );
                self.global
            }),
            None => self.global,
        }
    }

    /// 컨테이너의 대상 이미지를 결정합니다.
    pub async fn decide(
        &self,
        container: &ContainerDescriptor,
        current: &ImageReference,
        cancel: &CancellationToken,
    ) -> UpdateDecision {
        let policy = self.policy_for(container);
        let unchanged = UpdateDecision {
            policy,
            target: current.clone(),
            changed: false,
        };

        if !policy.is_semver() || current.is_digest_pinned() {
            return unchanged;
        }

        let Some(current_version) = current.tag().and_then(parse_tag_version) else {
            debug!(
                container = %container.name,
                image = %current,
                %policy,
                "tag is not a semantic version, falling back to digest policy"
            );
            return unchanged;
        };

        let tags = match self.list_tags(current, cancel).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(
                    container = %container.name,
                    image = %current,
                    phase = e.phase_name(),
                    error = %e,
                    "tag listing failed, falling back to digest policy"
                );
                return unchanged;
            }
        };

        match resolve(&current_version, policy, &tags) {
            Some(candidate) => {
                let target = current.with_tag(&candidate.tag);
                info!(
                    container = %container.name,
                    from = %current,
                    to = %target,
                    %policy,
                    "found newer version"
                );
                UpdateDecision {
                    policy,
                    target,
                    changed: true,
                }
            }
            None => {
                debug!(
                    container = %container.name,
                    image = %current,
                    %policy,
                    "no newer version available"
                );
                unchanged
            }
        }
    }

    async fn list_tags(
        &self,
        reference: &ImageReference,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, UpdaterError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(UpdaterError::Cancelled),
            result = tokio::time::timeout(self.tag_list_timeout, self.registry.list_tags(reference)) => {
                result.map_err(|_| UpdaterError::RegistryTimeout {
                    repository: reference.repository_path().to_owned(),
                    timeout_secs: self.tag_list_timeout.as_secs(),
                })?
            }
        }
    }
}

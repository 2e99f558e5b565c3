//! 업데이터 에러 타입
//!
//! [`UpdaterError`]는 업데이트 판단과 컨테이너 교체 과정에서 발생하는 모든 에러를 표현합니다.
//! 스케줄러는 컨테이너 단위로 이 에러를 잡아 기록하며, 주기 전체를 중단시키지 않습니다.
//! `From<UpdaterError> for OrbitdError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use orbitd_core::error::{ConfigError, EngineError, OrbitdError};

use crate::transaction::Step;

/// 업데이터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// 이미지 참조 문자열이 문법적으로 잘못됨
    #[error("malformed image reference '{reference}': {reason}")]
    MalformedReference {
        /// 원본 참조 문자열
        reference: String,
        /// 실패 사유
        reason: String,
    },

    /// 레지스트리 태그 조회 시간 초과
    #[error("registry timed out listing tags for '{repository}' after {timeout_secs}s")]
    RegistryTimeout {
        /// 대상 저장소
        repository: String,
        /// 적용된 타임아웃 (초)
        timeout_secs: u64,
    },

    /// 레지스트리 호출 실패
    #[error("registry unavailable for '{repository}': {reason}")]
    RegistryUnavailable {
        /// 대상 저장소
        repository: String,
        /// 실패 사유
        reason: String,
    },

    /// 이미지 pull 실패 (상태 변경 없음, 다음 주기에 재시도)
    #[error("pull failed for '{image}': {reason}")]
    PullFailed {
        /// 대상 이미지
        image: String,
        /// 실패 사유
        reason: String,
    },

    /// 교체 트랜잭션 도중 엔진 작업 실패 (서비스는 원래 컨테이너로 유지됨)
    #[error("{step} failed for container '{container}': {reason}")]
    EngineOperation {
        /// 실패한 단계
        step: Step,
        /// 컨테이너 이름
        container: String,
        /// 실패 사유
        reason: String,
    },

    /// 롤백 실패 -- 컨테이너가 어떤 이름으로도 실행 중이지 않음
    #[error("rollback failed for container '{container}', manual intervention required: {reason}")]
    RollbackFailed {
        /// 컨테이너 이름
        container: String,
        /// 실패 사유
        reason: String,
    },

    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// Docker 소켓 연결 실패
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 취소 신호 수신
    #[error("operation cancelled")]
    Cancelled,
}

impl UpdaterError {
    /// 메트릭과 로그에 사용할 고정된 단계명을 반환합니다.
    pub fn phase_name(&self) -> &'static str {
        match self {
            Self::MalformedReference { .. } => "reference",
            Self::RegistryTimeout { .. } | Self::RegistryUnavailable { .. } => "registry",
            Self::PullFailed { .. } => "pull",
            Self::EngineOperation { step, .. } => step.as_str(),
            Self::RollbackFailed { .. } => "rollback",
            Self::DockerApi(_) | Self::DockerConnection(_) | Self::ContainerNotFound(_) => {
                "engine"
            }
            Self::Config { .. } => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<UpdaterError> for OrbitdError {
    fn from(err: UpdaterError) -> Self {
        match &err {
            UpdaterError::Config { field, reason } => OrbitdError::Config(ConfigError::InvalidValue {
                field: field.clone(),
                reason: reason.clone(),
            }),
            UpdaterError::RegistryTimeout { .. } | UpdaterError::RegistryUnavailable { .. } => {
                OrbitdError::Engine(EngineError::Registry(err.to_string()))
            }
            UpdaterError::EngineOperation {
                container, reason, ..
            } => OrbitdError::Engine(EngineError::UpdateFailed {
                container: container.clone(),
                reason: reason.clone(),
            }),
            UpdaterError::RollbackFailed { container, reason } => {
                OrbitdError::Engine(EngineError::RollbackFailed {
                    container: container.clone(),
                    reason: reason.clone(),
                })
            }
            UpdaterError::MalformedReference { .. }
            | UpdaterError::PullFailed { .. }
            | UpdaterError::DockerApi(_)
            | UpdaterError::DockerConnection(_)
            | UpdaterError::ContainerNotFound(_)
            | UpdaterError::Cancelled => OrbitdError::Engine(EngineError::DockerApi(err.to_string())),
        }
    }
}

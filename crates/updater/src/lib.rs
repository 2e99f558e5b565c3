//! orbitd 업데이터 -- 업데이트 결정과 안전한 컨테이너 교체
//!
//! 실행 중인 컨테이너마다 레이블과 전역 설정으로 정책을 정하고, 레지스트리 태그와
//! 이미지 다이제스트를 비교해 교체가 필요한지 판단합니다. 교체는 stop/rename/run
//! 단계로 이루어진 트랜잭션이며, 실패 시 원래 컨테이너를 복구합니다.
//!
//! # 모듈 구조
//!
//! - [`error`]: 도메인 에러 (`UpdaterError`)
//! - [`config`]: 업데이터 설정 (`UpdaterConfig`, 빌더)
//! - [`reference`]: 이미지 참조 파싱 (`ImageReference`)
//! - [`version`]: 태그 버전 해석 (`resolve`, `Candidate`)
//! - [`policy`]: 정책 결정 (`UpdatePolicy`, `PolicyResolver`, `LabelFilter`)
//! - [`registry`]: 레지스트리 태그 조회 (`RegistryClient`, `HttpRegistryClient`)
//! - [`docker`]: Docker API 추상화 (`DockerClient`, `BollardDockerClient`)
//! - [`digest`]: 다이제스트 비교
//! - [`identity`]: 자기 컨테이너 판별 (`SelfDetector`)
//! - [`transaction`]: 교체 트랜잭션 (`ReplacementTransaction`)
//! - [`scheduler`]: 주기 실행 (`Scheduler`)
//!
//! # 아키텍처
//!
//! ```text
//! Scheduler ──tick──▶ DockerClient.list_containers()
//!                          │ (컨테이너마다)
//!                     PolicyResolver.decide() ◀── RegistryClient.list_tags()
//!                          │
//!                     pull + digest::changed()
//!                          │
//!                     ReplacementTransaction.execute()
//!                          │
//!                     Committed / RolledBack / Down
//! ```

pub mod config;
pub mod digest;
pub mod docker;
pub mod error;
pub mod identity;
pub mod policy;
pub mod reference;
pub mod registry;
pub mod scheduler;
pub mod transaction;
pub mod version;

// --- Public API Re-exports ---

// Scheduler
pub use scheduler::{CycleReport, Scheduler};

// Configuration
pub use config::{UpdaterConfig, UpdaterConfigBuilder};

// Error
pub use error::UpdaterError;

// Image references and versions
pub use reference::ImageReference;
pub use version::{Candidate, resolve};

// Policy
pub use policy::{LABEL_ENABLE, LABEL_POLICY, LabelFilter, PolicyResolver, UpdateDecision, UpdatePolicy};

// Clients
pub use docker::{
    BollardDockerClient, ContainerBlueprint, ContainerSnapshot, DockerClient, ImageDetails,
};
pub use registry::{HttpRegistryClient, RegistryClient};

// Replacement
pub use identity::{HostnameSelfDetector, SelfDetector};
pub use transaction::{
    AbortReason, Phase, ReplacementTransaction, Step, TransactionOutcome,
};

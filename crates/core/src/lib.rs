//! orbitd 공통 크레이트
//!
//! 데몬과 업데이터가 함께 사용하는 에러, 설정, 도메인 타입, 메트릭 이름을 정의합니다.
//!
//! # 모듈 구조
//!
//! - [`error`]: 최상위 에러 (`OrbitdError`, `ConfigError`, `EngineError`)
//! - [`config`]: `orbitd.toml` 설정 (`OrbitdConfig`)
//! - [`types`]: 컨테이너 도메인 타입 (`ContainerDescriptor`, `ContainerState`)
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, EngineError, OrbitdError};

// 설정
pub use config::{DockerConfig, GeneralConfig, MetricsConfig, OrbitdConfig, UpdateConfig};

// 도메인 타입
pub use types::{ContainerDescriptor, ContainerState};

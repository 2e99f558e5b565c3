//! 에러 타입 -- 도메인별 에러 정의

/// orbitd 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum OrbitdError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 엔진/레지스트리 관련 에러
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 엔진 및 이미지 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// 레지스트리 호출 실패 (타임아웃 포함)
    #[error("registry error: {0}")]
    Registry(String),

    /// 컨테이너 업데이트 실패 (서비스는 유지됨)
    #[error("update failed for container '{container}': {reason}")]
    UpdateFailed { container: String, reason: String },

    /// 롤백 실패 -- 컨테이너가 내려간 상태
    #[error("rollback failed for container '{container}': {reason}")]
    RollbackFailed { container: String, reason: String },
}

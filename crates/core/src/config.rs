//! 설정 관리 -- orbitd.toml 파싱 및 런타임 설정
//!
//! [`OrbitdConfig`]는 데몬 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, `orbitd-daemon`에서 적용)
//! 2. 환경변수 (`ORBITD_UPDATER_POLICY=minor` 형식)
//! 3. 설정 파일 (`orbitd.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), orbitd_core::error::OrbitdError> {
//! use orbitd_core::config::OrbitdConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = OrbitdConfig::load("orbitd.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = OrbitdConfig::parse("[updater]\npolicy = \"minor\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, OrbitdError};

/// 허용되는 업데이트 정책 이름
pub const VALID_POLICIES: [&str; 4] = ["digest", "patch", "minor", "major"];

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];

/// 설정 상한값 상수
const MAX_INTERVAL_SECS: u64 = 30 * 24 * 3600;
const MAX_PACING_MS: u64 = 60_000;
const MAX_TAG_LIST_TIMEOUT_SECS: u64 = 300;
const MAX_PULL_TIMEOUT_SECS: u64 = 24 * 3600;

/// orbitd 통합 설정
///
/// `orbitd.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrbitdConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Docker 연결 설정
    #[serde(default)]
    pub docker: DockerConfig,
    /// 업데이트 스케줄러 설정
    #[serde(default)]
    pub updater: UpdateConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl OrbitdConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, OrbitdError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값으로 시작합니다.
    ///
    /// 파일이 존재하지만 읽거나 파싱할 수 없으면 에러를 반환합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, OrbitdError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(OrbitdError::Config(ConfigError::FileNotFound { .. })) => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, OrbitdError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OrbitdError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                OrbitdError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, OrbitdError> {
        toml::from_str(toml_str).map_err(|e| {
            OrbitdError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `ORBITD_{SECTION}_{FIELD}`
    /// 예: `ORBITD_UPDATER_INTERVAL_SECS=3600`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "ORBITD_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "ORBITD_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "ORBITD_GENERAL_PID_FILE");

        // Docker
        override_string(&mut self.docker.socket, "ORBITD_DOCKER_SOCKET");

        // Updater
        override_string(&mut self.updater.policy, "ORBITD_UPDATER_POLICY");
        override_u64(
            &mut self.updater.interval_secs,
            "ORBITD_UPDATER_INTERVAL_SECS",
        );
        override_bool(&mut self.updater.cleanup, "ORBITD_UPDATER_CLEANUP");
        override_bool(
            &mut self.updater.require_label,
            "ORBITD_UPDATER_REQUIRE_LABEL",
        );
        override_u64(&mut self.updater.pacing_ms, "ORBITD_UPDATER_PACING_MS");
        override_u64(
            &mut self.updater.tag_list_timeout_secs,
            "ORBITD_UPDATER_TAG_LIST_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.updater.pull_timeout_secs,
            "ORBITD_UPDATER_PULL_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "ORBITD_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "ORBITD_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "ORBITD_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), OrbitdError> {
        check_one_of(
            "general.log_level",
            &self.general.log_level,
            &VALID_LOG_LEVELS,
        )?;
        check_one_of(
            "general.log_format",
            &self.general.log_format,
            &VALID_LOG_FORMATS,
        )?;
        check_one_of("updater.policy", &self.updater.policy, &VALID_POLICIES)?;

        check_range(
            "updater.interval_secs",
            self.updater.interval_secs,
            1,
            MAX_INTERVAL_SECS,
        )?;
        check_range(
            "updater.pacing_ms",
            self.updater.pacing_ms,
            0,
            MAX_PACING_MS,
        )?;
        check_range(
            "updater.tag_list_timeout_secs",
            self.updater.tag_list_timeout_secs,
            1,
            MAX_TAG_LIST_TIMEOUT_SECS,
        )?;
        check_range(
            "updater.pull_timeout_secs",
            self.updater.pull_timeout_secs,
            1,
            MAX_PULL_TIMEOUT_SECS,
        )?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "port must be non-zero when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// Docker 연결 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker 소켓 경로 (빈 문자열이면 `DOCKER_HOST` 또는 플랫폼 기본값)
    pub socket: String,
}

/// 업데이트 스케줄러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// 전역 업데이트 정책 (digest, patch, minor, major)
    pub policy: String,
    /// 업데이트 확인 주기 (초)
    pub interval_secs: u64,
    /// 업데이트 성공 후 이전 이미지 삭제 여부
    pub cleanup: bool,
    /// `orbitd.enable=true` 레이블이 있는 컨테이너만 감시
    pub require_label: bool,
    /// 컨테이너 간 처리 간격 (밀리초)
    pub pacing_ms: u64,
    /// 레지스트리 태그 조회 타임아웃 (초)
    pub tag_list_timeout_secs: u64,
    /// 이미지 pull 타임아웃 (초)
    pub pull_timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            policy: "digest".to_owned(),
            interval_secs: 12 * 3600,
            cleanup: true,
            require_label: false,
            pacing_ms: 1000,
            tag_list_timeout_secs: 10,
            pull_timeout_secs: 15 * 60,
        }
    }
}

/// Prometheus 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9184,
        }
    }
}

/// 사람이 읽기 쉬운 기간 문자열을 초 단위로 변환합니다.
///
/// `"300"`, `"30s"`, `"5m"`, `"12h"`, `"1d"`, `"1h30m"` 형식을 지원합니다.
pub fn parse_duration_secs(input: &str) -> Result<u64, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_owned());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(secs);
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let multiplier = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86_400,
            other => return Err(format!("unknown duration unit '{other}' in '{input}'")),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("missing number before '{c}' in '{input}'"))?;
        digits.clear();
        total = value
            .checked_mul(multiplier)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| format!("duration '{input}' is too large"))?;
    }

    if !digits.is_empty() {
        return Err(format!("trailing number without unit in '{input}'"));
    }
    Ok(total)
}

fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), OrbitdError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: format!("must be one of: {}", allowed.join(", ")),
    }
    .into())
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), OrbitdError> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: format!("must be {min}-{max}"),
    }
    .into())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = OrbitdConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.updater.policy, "digest");
        assert_eq!(config.updater.interval_secs, 43_200);
        assert!(config.updater.cleanup);
        assert!(!config.updater.require_label);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        OrbitdConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = OrbitdConfig::parse("").unwrap();
        assert_eq!(config.updater.pull_timeout_secs, 900);
        assert_eq!(config.updater.tag_list_timeout_secs, 10);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[updater]
policy = "minor"
require_label = true
"#;
        let config = OrbitdConfig::parse(toml).unwrap();
        assert_eq!(config.updater.policy, "minor");
        assert!(config.updater.require_label);
        // 나머지는 기본값 유지
        assert!(config.updater.cleanup);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = OrbitdConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            OrbitdError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_policy() {
        let mut config = OrbitdConfig::default();
        config.updater.policy = "latest".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("updater.policy"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = OrbitdConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = OrbitdConfig::default();
        config.updater.interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn validate_accepts_zero_pacing() {
        let mut config = OrbitdConfig::default();
        config.updater.pacing_ms = 0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_metrics_port_when_enabled() {
        let mut config = OrbitdConfig::default();
        config.metrics.enabled = true;
        config.metrics.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.port"));
    }

    #[test]
    fn parse_duration_plain_seconds() {
        assert_eq!(parse_duration_secs("300").unwrap(), 300);
    }

    #[test]
    fn parse_duration_with_units() {
        assert_eq!(parse_duration_secs("30s").unwrap(), 30);
        assert_eq!(parse_duration_secs("5m").unwrap(), 300);
        assert_eq!(parse_duration_secs("12h").unwrap(), 43_200);
        assert_eq!(parse_duration_secs("1d").unwrap(), 86_400);
        assert_eq!(parse_duration_secs("1h30m").unwrap(), 5_400);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration_secs("").is_err());
        assert!(parse_duration_secs("5x").is_err());
        assert!(parse_duration_secs("h").is_err());
        assert!(parse_duration_secs("1h30").is_err());
    }

    #[test]
    #[serial]
    fn env_override_applies_updater_fields() {
        let mut config = OrbitdConfig::default();
        // SAFETY: serial 테스트이므로 환경변수를 동시에 조작하는 스레드가 없습니다.
        unsafe {
            std::env::set_var("ORBITD_UPDATER_POLICY", "patch");
            std::env::set_var("ORBITD_UPDATER_CLEANUP", "false");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("ORBITD_UPDATER_POLICY");
            std::env::remove_var("ORBITD_UPDATER_CLEANUP");
        }
        assert_eq!(config.updater.policy, "patch");
        assert!(!config.updater.cleanup);
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: serial 테스트이므로 환경변수를 동시에 조작하는 스레드가 없습니다.
        unsafe { std::env::set_var("TEST_ORBITD_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_ORBITD_BOOL_BAD");
        unsafe { std::env::remove_var("TEST_ORBITD_BOOL_BAD") };
        assert!(val);
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = 42u64;
        override_u64(&mut val, "TEST_ORBITD_NONEXISTENT_12345");
        assert_eq!(val, 42);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = OrbitdConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = OrbitdConfig::parse(&toml_str).unwrap();
        assert_eq!(config.updater.policy, parsed.updater.policy);
        assert_eq!(config.metrics.port, parsed.metrics.port);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = OrbitdConfig::from_file("/nonexistent/path/orbitd.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrbitdError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn load_or_default_falls_back_when_missing() {
        let config = OrbitdConfig::load_or_default("/nonexistent/path/orbitd.toml")
            .await
            .unwrap();
        assert_eq!(config.updater.policy, "digest");
    }

    #[tokio::test]
    #[serial]
    async fn load_or_default_reports_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbitd.toml");
        std::fs::write(&path, "[updater\npolicy=").unwrap();
        let err = OrbitdConfig::load_or_default(&path).await.unwrap_err();
        assert!(matches!(
            err,
            OrbitdError::Config(ConfigError::ParseFailed { .. })
        ));
    }
}

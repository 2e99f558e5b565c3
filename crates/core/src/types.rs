//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 컨테이너 실행 상태
///
/// Docker 엔진이 보고하는 상태 문자열을 닫힌 열거형으로 매핑합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    /// 엔진 상태 문자열을 변환합니다. 알 수 없는 값은 `Unknown`입니다.
    pub fn from_engine(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// 컨테이너 목록 조회 결과
///
/// 매 업데이트 주기마다 엔진에서 새로 가져오며, 주기를 넘어 캐시하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (선행 `/` 제거됨)
    pub name: String,
    /// 컨테이너가 참조하는 이미지 문자열 (예: `nginx:1.25`)
    pub image: String,
    /// 로컬 이미지 ID (`sha256:...`)
    pub image_id: String,
    /// 컨테이너 레이블
    pub labels: HashMap<String, String>,
    /// 실행 상태
    pub state: ContainerState,
}

impl ContainerDescriptor {
    /// 실행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    /// 레이블 값을 조회합니다.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl fmt::Display for ContainerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) image={}", self.name, self.id, self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_state_from_engine_is_case_insensitive() {
        assert_eq!(ContainerState::from_engine("running"), ContainerState::Running);
        assert_eq!(ContainerState::from_engine("Exited"), ContainerState::Exited);
        assert_eq!(ContainerState::from_engine("zombie"), ContainerState::Unknown);
    }

    #[test]
    fn descriptor_label_lookup() {
        let descriptor = ContainerDescriptor {
            id: "abc123".to_owned(),
            name: "app".to_owned(),
            image: "myapp:1.2.3".to_owned(),
            image_id: "sha256:aaaa".to_owned(),
            labels: HashMap::from([("orbitd.policy".to_owned(), "minor".to_owned())]),
            state: ContainerState::Running,
        };
        assert!(descriptor.is_running());
        assert_eq!(descriptor.label("orbitd.policy"), Some("minor"));
        assert_eq!(descriptor.label("orbitd.enable"), None);
        assert!(descriptor.to_string().contains("myapp:1.2.3"));
    }
}

//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 업데이터는 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았으면 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `orbitd_`
//! - 접미어: `_total` (counter), `_seconds` (histogram, uptime gauge), `_info` (build info)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 정책 레이블 키 (digest, patch, minor, major)
pub const LABEL_POLICY: &str = "policy";

/// 실패 단계 레이블 키 (reference, pull, stop, rename, start)
pub const LABEL_PHASE: &str = "phase";

// ─── Updater 메트릭 ────────────────────────────────────────────────

/// 완료된 업데이트 주기 수 (counter)
pub const UPDATER_CYCLES_TOTAL: &str = "orbitd_updater_cycles_total";

/// 업데이트 주기 소요 시간 (histogram, 초)
pub const UPDATER_CYCLE_DURATION_SECONDS: &str = "orbitd_updater_cycle_duration_seconds";

/// 검사한 컨테이너 수 (counter, label: policy)
pub const UPDATER_CONTAINERS_CHECKED_TOTAL: &str = "orbitd_updater_containers_checked_total";

/// 교체에 성공한 컨테이너 수 (counter)
pub const UPDATER_UPDATES_TOTAL: &str = "orbitd_updater_updates_total";

/// 롤백으로 복구된 교체 시도 수 (counter)
pub const UPDATER_ROLLBACKS_TOTAL: &str = "orbitd_updater_rollbacks_total";

/// 컨테이너 처리 실패 수 (counter, label: phase)
pub const UPDATER_FAILURES_TOTAL: &str = "orbitd_updater_failures_total";

/// 롤백까지 실패해 내려간 컨테이너 수 (counter)
pub const UPDATER_CONTAINERS_DOWN_TOTAL: &str = "orbitd_updater_containers_down_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "orbitd_daemon_build_info";

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "orbitd_daemon_uptime_seconds";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_gauge!(DAEMON_BUILD_INFO, "Build information of the running daemon");
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Seconds since the daemon started");

    describe_counter!(UPDATER_CYCLES_TOTAL, "Total completed update cycles");
    describe_histogram!(
        UPDATER_CYCLE_DURATION_SECONDS,
        "Wall-clock duration of one update cycle in seconds"
    );
    describe_counter!(
        UPDATER_CONTAINERS_CHECKED_TOTAL,
        "Total containers checked for updates"
    );
    describe_counter!(UPDATER_UPDATES_TOTAL, "Total containers replaced successfully");
    describe_counter!(
        UPDATER_ROLLBACKS_TOTAL,
        "Total failed replacements recovered by rollback"
    );
    describe_counter!(UPDATER_FAILURES_TOTAL, "Total per-container update failures");
    describe_counter!(
        UPDATER_CONTAINERS_DOWN_TOTAL,
        "Total containers left down after a failed rollback"
    );
}

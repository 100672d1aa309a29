//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `surveyor_`
//! - 영역: `dispatch_`, `handler_`, `dns_`, `ttl_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(surveyor_core::metrics::DNS_QUERIES_TOTAL, "type" => "A").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 핸들러 이름 레이블 키
pub const LABEL_HANDLER: &str = "handler";

/// 에셋 타입 레이블 키
pub const LABEL_ASSET_TYPE: &str = "asset_type";

/// DNS 레코드 타입 레이블 키
pub const LABEL_RECORD_TYPE: &str = "type";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Dispatch 메트릭 ───────────────────────────────────────────────

/// Dispatch: 큐에 들어간 이벤트 수 (counter)
pub const DISPATCH_EVENTS_TOTAL: &str = "surveyor_dispatch_events_total";

/// Dispatch: 세션 내 중복으로 제외된 이벤트 수 (counter)
pub const DISPATCH_EVENTS_DEDUPLICATED_TOTAL: &str = "surveyor_dispatch_events_deduplicated_total";

/// Dispatch: 처리 대기 또는 실행 중인 작업 수 (gauge)
pub const DISPATCH_IN_FLIGHT: &str = "surveyor_dispatch_in_flight";

/// Handler: 콜백 호출 수 (counter, label: handler)
pub const HANDLER_INVOCATIONS_TOTAL: &str = "surveyor_handler_invocations_total";

/// Handler: 콜백 에러 수 (counter, label: handler)
pub const HANDLER_ERRORS_TOTAL: &str = "surveyor_handler_errors_total";

/// Handler: 콜백 실행 시간 (histogram, 초)
pub const HANDLER_DURATION_SECONDS: &str = "surveyor_handler_duration_seconds";

// ─── DNS 메트릭 ────────────────────────────────────────────────────

/// DNS: 전송한 질의 수 (counter, label: type, result)
pub const DNS_QUERIES_TOTAL: &str = "surveyor_dns_queries_total";

/// DNS: 스윕으로 생성한 주소 수 (counter)
pub const DNS_SWEEP_ADDRESSES_TOTAL: &str = "surveyor_dns_sweep_addresses_total";

/// DNS: 존 워크로 처리한 레벨 수 (counter)
pub const DNS_ZONE_LEVELS_TOTAL: &str = "surveyor_dns_zone_levels_total";

/// DNS: 검증에 실패해 버린 PTR 응답 수 (counter)
pub const DNS_PTR_REJECTED_TOTAL: &str = "surveyor_dns_ptr_rejected_total";

// ─── TTL 게이트 메트릭 ─────────────────────────────────────────────

/// TTL: 그래프 캐시로 응답한 조회 수 (counter, label: handler)
pub const TTL_CACHE_HITS_TOTAL: &str = "surveyor_ttl_cache_hits_total";

/// TTL: 외부 소스에 능동 질의한 수 (counter, label: handler)
pub const TTL_CACHE_MISSES_TOTAL: &str = "surveyor_ttl_cache_misses_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 등록된 플러그인 수 (gauge)
pub const DAEMON_PLUGINS_REGISTERED: &str = "surveyor_daemon_plugins_registered";

/// Daemon: 등록된 핸들러 수 (gauge)
pub const DAEMON_HANDLERS_REGISTERED: &str = "surveyor_daemon_handlers_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "surveyor_daemon_build_info";

/// 핸들러 실행 시간 히스토그램 버킷 (초)
pub const HANDLER_DURATION_BUCKETS: &[f64] = &[0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

/// 모든 메트릭의 설명을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        DISPATCH_EVENTS_TOTAL,
        "Total number of events queued for registered handlers"
    );
    describe_counter!(
        DISPATCH_EVENTS_DEDUPLICATED_TOTAL,
        "Total number of events dropped because the asset was already dispatched in the session"
    );
    describe_gauge!(
        DISPATCH_IN_FLIGHT,
        "Number of handler invocations queued or running"
    );
    describe_counter!(
        HANDLER_INVOCATIONS_TOTAL,
        "Total number of handler callback invocations"
    );
    describe_counter!(
        HANDLER_ERRORS_TOTAL,
        "Total number of handler callbacks that returned an error"
    );
    describe_histogram!(
        HANDLER_DURATION_SECONDS,
        "Handler callback execution time in seconds"
    );

    describe_counter!(DNS_QUERIES_TOTAL, "Total number of DNS queries issued");
    describe_counter!(
        DNS_SWEEP_ADDRESSES_TOTAL,
        "Total number of addresses produced by IP sweeps"
    );
    describe_counter!(
        DNS_ZONE_LEVELS_TOTAL,
        "Total number of zone levels walked"
    );
    describe_counter!(
        DNS_PTR_REJECTED_TOTAL,
        "Total number of PTR answers rejected by validation"
    );

    describe_counter!(
        TTL_CACHE_HITS_TOTAL,
        "Lookups served from the asset graph within the freshness window"
    );
    describe_counter!(
        TTL_CACHE_MISSES_TOTAL,
        "Lookups that required an active query to the source"
    );

    describe_gauge!(
        DAEMON_PLUGINS_REGISTERED,
        "Number of plugins registered in the daemon"
    );
    describe_gauge!(
        DAEMON_HANDLERS_REGISTERED,
        "Number of handlers registered in the dispatcher"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        DISPATCH_EVENTS_TOTAL,
        DISPATCH_EVENTS_DEDUPLICATED_TOTAL,
        DISPATCH_IN_FLIGHT,
        HANDLER_INVOCATIONS_TOTAL,
        HANDLER_ERRORS_TOTAL,
        HANDLER_DURATION_SECONDS,
        DNS_QUERIES_TOTAL,
        DNS_SWEEP_ADDRESSES_TOTAL,
        DNS_ZONE_LEVELS_TOTAL,
        DNS_PTR_REJECTED_TOTAL,
        TTL_CACHE_HITS_TOTAL,
        TTL_CACHE_MISSES_TOTAL,
        DAEMON_PLUGINS_REGISTERED,
        DAEMON_HANDLERS_REGISTERED,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_surveyor_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("surveyor_"),
                "Metric '{}' does not start with 'surveyor_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        let counters = [
            DISPATCH_EVENTS_TOTAL,
            HANDLER_INVOCATIONS_TOTAL,
            HANDLER_ERRORS_TOTAL,
            DNS_QUERIES_TOTAL,
            TTL_CACHE_HITS_TOTAL,
        ];
        for name in counters {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn duration_buckets_are_sorted() {
        let buckets = HANDLER_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(buckets[i] > buckets[i - 1]);
        }
    }
}

//! DNS 모듈 에러 타입
//!
//! 질의 실패는 핸들러 경계에서 `EngineError::SourceUnavailable`로 바뀌어
//! 디스패처 로그로만 소비됩니다.

use surveyor_core::error::{ConfigError, SurveyorError};
use surveyor_engine::EngineError;

/// DNS 소스 이름 (출처 속성, 데이터 소스 설정 키)
pub const DNS_SOURCE: &str = "DNS";

/// DNS 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    /// 전송 실패, 타임아웃, SERVFAIL 등
    #[error("query {name} {rr_type} failed: {reason}")]
    Query {
        name: String,
        rr_type: String,
        reason: String,
    },

    /// 질의할 리졸버가 없음
    #[error("no resolvers configured")]
    NoResolvers,

    /// 잘못된 이름
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// 이름 추출 패턴 컴파일 실패
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// 리졸버 설정 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<DnsError> for EngineError {
    fn from(err: DnsError) -> Self {
        match err {
            DnsError::Config(e) => EngineError::Config(e),
            other => EngineError::SourceUnavailable {
                source_name: DNS_SOURCE.to_owned(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<DnsError> for SurveyorError {
    fn from(err: DnsError) -> Self {
        match err {
            DnsError::Config(e) => SurveyorError::Config(e),
            other => SurveyorError::Dispatch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_becomes_source_unavailable() {
        let err: EngineError = DnsError::Query {
            name: "www.example.com".to_owned(),
            rr_type: "A".to_owned(),
            reason: "timeout".to_owned(),
        }
        .into();
        match err {
            EngineError::SourceUnavailable {
                source_name,
                reason,
            } => {
                assert_eq!(source_name, DNS_SOURCE);
                assert!(reason.contains("www.example.com"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn config_error_stays_config() {
        let err: SurveyorError = DnsError::Config(ConfigError::InvalidValue {
            field: "dns.resolvers".to_owned(),
            reason: "empty".to_owned(),
        })
        .into();
        assert!(matches!(err, SurveyorError::Config(_)));
    }
}

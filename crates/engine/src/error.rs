//! 엔진 에러 타입
//!
//! [`EngineError`]는 디스패치, 핸들러 실행, 플러그인 생명주기에서 발생하는 에러를
//! 표현합니다. 핸들러 콜백이 반환한 에러는 디스패처가 로그로만 소비하며
//! 세션이나 다른 핸들러를 중단시키지 않습니다.
//! `From<EngineError> for SurveyorError` 변환으로 상위 레이어에서 `?`를 쓸 수 있습니다.

use surveyor_core::error::{ConfigError, GraphError, PluginError, SurveyorError};
use surveyor_core::types::AssetType;

/// 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 허용된 전이가 없음 (치명적이지 않음, 결과 없이 종료)
    #[error("no permitted transformation from {from} to {to}")]
    TransformMismatch { from: String, to: String },

    /// 외부 소스 실패 (TTL 워터마크를 갱신하지 않음)
    #[error("source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// 이벤트의 엔티티 타입이 핸들러가 기대한 타입과 다름
    #[error("handler '{handler}' expected {expected} but received {actual}")]
    AssetMismatch {
        handler: String,
        expected: AssetType,
        actual: AssetType,
    },

    /// 그래프 쓰기/조회 실패
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// 설정 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 플러그인/핸들러 등록 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// 워커 풀이 닫힘
    #[error("worker pool closed")]
    PoolClosed,

    /// 세션이 취소되어 더 이상 작업을 받지 않음
    #[error("session {0} is closed")]
    SessionClosed(String),
}

impl EngineError {
    /// 로그 레벨을 낮춰도 되는 정상 흐름의 에러인지 여부
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::TransformMismatch { .. } | Self::SessionClosed(_)
        )
    }
}

impl From<EngineError> for SurveyorError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Graph(e) => SurveyorError::Graph(e),
            EngineError::Config(e) => SurveyorError::Config(e),
            EngineError::Plugin(e) => SurveyorError::Plugin(e),
            other => SurveyorError::Dispatch(other.to_string()),
        }
    }
}

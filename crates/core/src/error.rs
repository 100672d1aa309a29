//! 에러 타입 -- 도메인별 에러 정의

/// Surveyor 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SurveyorError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 에셋 그래프 에러
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// 스코프 판정 에러
    #[error("scope error: {0}")]
    Scope(#[from] ScopeError),

    /// 플러그인 관련 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// 변환 매칭 에러
    #[error("transformation error: {0}")]
    Transform(#[from] MatchError),

    /// 디스패치 에러
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 모든 설정 에러는 로드 시점에 치명적이며, 디스패치 시작 전에 세션을 중단시킵니다.
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

    /// 에셋 카탈로그에 없는 타입
    #[error("unknown asset type '{0}'")]
    UnknownAssetType(String),

    /// 유효하지 않은 변환 규칙
    #[error("invalid transformation {from}->{to}: {reason}")]
    InvalidTransformation {
        from: String,
        to: String,
        reason: String,
    },
}

/// 변환 매칭 결과 에러 (치명적이지 않음)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// 후보 중 어떤 타입도 규칙에 매칭되지 않음
    #[error("zero transformation matches for {from}")]
    NoMatches { from: String },
}

/// 에셋 그래프 에러
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// 엔티티를 찾을 수 없음
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// 엣지를 찾을 수 없음
    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    /// 유효하지 않은 엣지 (양 끝 엔티티 누락 등)
    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    /// 저장소 잠금 실패
    #[error("graph store lock poisoned")]
    LockPoisoned,

    /// 백엔드 저장소 에러
    #[error("backend error: {0}")]
    Backend(String),
}

/// 스코프 판정 에러
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// 잘못된 CIDR 표기
    #[error("invalid cidr '{0}'")]
    InvalidCidr(String),

    /// 잘못된 주소 표기
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// 잘못된 도메인 이름
    #[error("invalid domain '{0}'")]
    InvalidDomain(String),
}

/// 플러그인 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 동일 이름 플러그인이 이미 등록됨
    #[error("plugin already registered: {name}")]
    AlreadyRegistered { name: String },

    /// 동일 이름 핸들러가 이미 등록됨
    #[error("handler already registered: {name}")]
    HandlerAlreadyRegistered { name: String },

    /// 플러그인을 찾을 수 없음
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// 잘못된 상태 전환
    #[error("plugin '{name}' cannot {action} from state {state}")]
    InvalidState {
        name: String,
        action: String,
        state: String,
    },

    /// 플러그인 시작 실패
    #[error("plugin start failed: {0}")]
    StartFailed(String),

    /// 플러그인 정지 실패
    #[error("plugin stop failed: {0}")]
    StopFailed(String),
}

//! Surveyor 공통 크레이트
//!
//! 에셋 카탈로그, 에러, 설정, 변환 매처, 에셋 그래프와 스코프 인터페이스,
//! 속도 제한기, 메트릭 이름을 제공합니다. 엔진과 DNS 크레이트는 모두 이
//! 크레이트의 타입을 통해 통신합니다.

pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod net;
pub mod rate_limit;
pub mod scope;
pub mod transform;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, GraphError, MatchError, PluginError, ScopeError, SurveyorError};

// 설정
pub use config::{ApexMatching, DataSourceConfig, SurveyorConfig};

// 그래프/스코프
pub use graph::{AssetGraph, GraphStats, MemoryGraph};
pub use scope::{Scope, ScopeChecker};

// 변환/속도 제한
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use transform::{Matches, Transformation, TransformationSet};

// 도메인 타입
pub use net::Cidr;
pub use types::{
    Asset, AssetType, Edge, EdgeProperty, EdgeRequest, Entity, EntityProperty, Property,
    RecordType, Relation, RrHeader, Source, SourceProperty,
};

//! Surveyor 디스패치 엔진
//!
//! 새로 발견된 에셋을 관심 있는 탐색 모듈로 라우팅합니다.
//!
//! # 구성
//! - [`Dispatcher`]: 핸들러별 큐, 우선순위 순서, 동시 실행 상한, 에러 격리
//! - [`Session`]: 세션 범위 상태, 취소 신호, 정지 상태 감지
//! - [`WorkerPool`]: 전역 동시 실행 상한 (backpressure)
//! - [`ttl`]: TTL 신선도 게이트
//! - [`Plugin`] / [`PluginRegistry`]: 탐색 모듈 생명주기
//! - [`SourcePlugin`]: 외부 데이터 소스 어댑터

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod plugin;
pub mod pool;
pub mod registry;
pub mod session;
pub mod source;
pub mod ttl;

pub use dispatcher::Dispatcher;
pub use error::EngineError;
pub use event::{Event, EventMetadata};
pub use plugin::{DynPlugin, Plugin, PluginInfo, PluginRegistry, PluginState};
pub use pool::WorkerPool;
pub use registry::{Handler, HandlerCallback, HandlerRegistry};
pub use session::{Session, SessionStats, WorkGuard};
pub use source::{DataSource, Finding, SourceHandler, SourcePlugin};
pub use ttl::{asset_monitored_within_ttl, mark_asset_monitored, ttl_start_time};

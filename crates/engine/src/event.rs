//! 이벤트 -- 디스패치의 단위
//!
//! [`Event`]는 트리거 엔티티와 세션 컨텍스트를 함께 운반합니다.
//! 핸들러는 이벤트의 세션을 통해 설정, 그래프, 스코프, 디스패처, 취소 신호에
//! 접근하므로 전역 상태가 필요 없습니다.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surveyor_core::types::{AssetType, Entity};

use crate::session::Session;

/// 이벤트 메타데이터 -- 발생 시각, 생성 모듈, 추적 ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    pub timestamp: DateTime<Utc>,
    /// 이벤트를 만든 모듈명 (예: "DNS", "seed")
    pub source_module: String,
    /// 같은 발견 흐름의 이벤트를 연결하는 ID
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 이어받는 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id로 메타데이터를 생성합니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self::new(source_module, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            self.timestamp.to_rfc3339(),
            self.source_module,
            self.trace_id
        )
    }
}

/// 디스패치 이벤트
#[derive(Clone)]
pub struct Event {
    pub id: String,
    pub metadata: EventMetadata,
    pub entity: Entity,
    pub session: Arc<Session>,
    /// 핸들러 간 전달되는 부가 데이터
    pub meta: Option<serde_json::Value>,
}

impl Event {
    /// 새 추적 흐름을 시작하는 이벤트를 생성합니다.
    pub fn new(entity: Entity, session: Arc<Session>, source_module: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(source_module),
            entity,
            session,
            meta: None,
        }
    }

    /// 같은 세션과 trace_id를 이어받는 후속 이벤트를 생성합니다.
    pub fn child(&self, entity: Entity, source_module: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(source_module, self.metadata.trace_id.clone()),
            entity,
            session: Arc::clone(&self.session),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn asset_type(&self) -> AssetType {
        self.entity.asset.asset_type()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("metadata", &self.metadata)
            .field("entity", &self.entity.asset)
            .field("session", &self.session.id())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.metadata, self.entity.asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trace_is_unique() {
        let a = EventMetadata::with_new_trace("seed");
        let b = EventMetadata::with_new_trace("seed");
        assert_ne!(a.trace_id, b.trace_id);
        assert_eq!(a.source_module, "seed");
    }

    #[test]
    fn metadata_display_contains_fields() {
        let meta = EventMetadata::new("DNS", "trace-1");
        let s = meta.to_string();
        assert!(s.contains("source=DNS"));
        assert!(s.contains("trace=trace-1"));
    }
}

//! 에셋 그래프 인터페이스
//!
//! 엔진은 좁은 생성/조회 인터페이스로만 그래프 저장소를 사용합니다.
//! 모든 생성 연산은 콘텐츠 키에 대해 멱등이어야 하며, 같은 객체를 동시에
//! 생성해도 저장된 객체는 하나로 수렴해야 합니다.

mod memory;

pub use memory::MemoryGraph;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GraphError;
use crate::types::{
    Asset, AssetType, Edge, EdgeProperty, EdgeRequest, Entity, EntityProperty, Property,
};

/// 그래프 크기 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub entities: usize,
    pub edges: usize,
    pub properties: usize,
}

/// 에셋 그래프 저장소
///
/// `since`가 주어지면 `last_seen >= since`인 객체만 반환합니다.
/// `relations`/`names`가 비어 있으면 이름 필터를 적용하지 않습니다.
#[async_trait]
pub trait AssetGraph: Send + Sync {
    /// 에셋을 생성하거나, 이미 있으면 `last_seen`을 갱신해 반환합니다.
    async fn create_asset(&self, asset: Asset) -> Result<Entity, GraphError>;

    /// 엣지를 생성하거나, 같은 (from, to, 관계 키) 엣지가 있으면 갱신해 반환합니다.
    async fn create_edge(&self, edge: EdgeRequest) -> Result<Edge, GraphError>;

    async fn find_entities_by_content(
        &self,
        asset: &Asset,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Entity>, GraphError>;

    async fn find_entity_by_id(&self, id: &str) -> Result<Entity, GraphError>;

    async fn find_entities_by_type(
        &self,
        asset_type: AssetType,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Entity>, GraphError>;

    async fn outgoing_edges(
        &self,
        entity: &Entity,
        since: Option<DateTime<Utc>>,
        relations: &[&str],
    ) -> Result<Vec<Edge>, GraphError>;

    async fn incoming_edges(
        &self,
        entity: &Entity,
        since: Option<DateTime<Utc>>,
        relations: &[&str],
    ) -> Result<Vec<Edge>, GraphError>;

    async fn create_entity_property(
        &self,
        entity: &Entity,
        property: Property,
    ) -> Result<EntityProperty, GraphError>;

    async fn create_edge_property(
        &self,
        edge: &Edge,
        property: Property,
    ) -> Result<EdgeProperty, GraphError>;

    async fn entity_properties(
        &self,
        entity: &Entity,
        since: Option<DateTime<Utc>>,
        names: &[&str],
    ) -> Result<Vec<EntityProperty>, GraphError>;

    async fn stats(&self) -> Result<GraphStats, GraphError>;
}

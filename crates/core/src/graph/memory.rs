//! 인메모리 에셋 그래프
//!
//! 모든 상태는 하나의 `std::sync::RwLock` 아래에 있으며, 잠금은 `.await` 지점을
//! 넘어 유지되지 않습니다.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{AssetGraph, GraphStats};
use crate::error::GraphError;
use crate::types::{
    Asset, AssetType, Edge, EdgeProperty, EdgeRequest, Entity, EntityProperty, Property,
};

#[derive(Default)]
struct Inner {
    entities: HashMap<String, Entity>,
    by_content: HashMap<(AssetType, String), String>,
    edges: HashMap<String, Edge>,
    by_edge_key: HashMap<(String, String, String), String>,
    outgoing: HashMap<String, Vec<String>>,
    incoming: HashMap<String, Vec<String>>,
    entity_props: HashMap<String, Vec<EntityProperty>>,
    edge_props: HashMap<String, Vec<EdgeProperty>>,
}

impl Inner {
    fn upsert_entity_property(
        &mut self,
        entity_id: &str,
        property: Property,
        at: DateTime<Utc>,
    ) -> EntityProperty {
        let key = property.key();
        let props = self.entity_props.entry(entity_id.to_owned()).or_default();
        if let Some(existing) = props.iter_mut().find(|p| p.property.key() == key) {
            if at > existing.last_seen {
                existing.last_seen = at;
            }
            return existing.clone();
        }
        let prop = EntityProperty {
            id: Uuid::new_v4().to_string(),
            entity_id: entity_id.to_owned(),
            property,
            created_at: at,
            last_seen: at,
        };
        props.push(prop.clone());
        prop
    }

    fn edges_for(
        &self,
        index: &HashMap<String, Vec<String>>,
        entity_id: &str,
        since: Option<DateTime<Utc>>,
        relations: &[&str],
    ) -> Vec<Edge> {
        index
            .get(entity_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
            .filter(|e| since.is_none_or(|s| e.last_seen >= s))
            .filter(|e| relations.is_empty() || relations.contains(&e.relation.name()))
            .cloned()
            .collect()
    }
}

/// content-keyed 인메모리 그래프
#[derive(Default)]
pub struct MemoryGraph {
    inner: RwLock<Inner>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, GraphError> {
        self.inner.read().map_err(|_| GraphError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, GraphError> {
        self.inner.write().map_err(|_| GraphError::LockPoisoned)
    }

    /// 지정한 시각으로 엔티티 속성을 기록합니다 (가져오기 및 시간 의존 테스트용).
    pub fn insert_entity_property_at(
        &self,
        entity: &Entity,
        property: Property,
        at: DateTime<Utc>,
    ) -> Result<EntityProperty, GraphError> {
        let mut inner = self.write()?;
        if !inner.entities.contains_key(&entity.id) {
            return Err(GraphError::EntityNotFound(entity.id.clone()));
        }
        Ok(inner.upsert_entity_property(&entity.id, property, at))
    }
}

impl std::fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGraph").finish_non_exhaustive()
    }
}

#[async_trait]
impl AssetGraph for MemoryGraph {
    async fn create_asset(&self, asset: Asset) -> Result<Entity, GraphError> {
        let now = Utc::now();
        let key = (asset.asset_type(), asset.key());
        let mut inner = self.write()?;
        if let Some(id) = inner.by_content.get(&key).cloned() {
            if let Some(entity) = inner.entities.get_mut(&id) {
                entity.last_seen = now;
                return Ok(entity.clone());
            }
        }
        let entity = Entity {
            id: Uuid::new_v4().to_string(),
            asset,
            created_at: now,
            last_seen: now,
        };
        inner.by_content.insert(key, entity.id.clone());
        inner.entities.insert(entity.id.clone(), entity.clone());
        Ok(entity)
    }

    async fn create_edge(&self, edge: EdgeRequest) -> Result<Edge, GraphError> {
        let now = Utc::now();
        let mut inner = self.write()?;
        for id in [&edge.from_id, &edge.to_id] {
            if !inner.entities.contains_key(id) {
                return Err(GraphError::InvalidEdge(format!("missing entity {id}")));
            }
        }
        let key = (
            edge.from_id.clone(),
            edge.to_id.clone(),
            edge.relation.key(),
        );
        if let Some(id) = inner.by_edge_key.get(&key).cloned() {
            if let Some(existing) = inner.edges.get_mut(&id) {
                existing.last_seen = now;
                return Ok(existing.clone());
            }
        }
        let stored = Edge {
            id: Uuid::new_v4().to_string(),
            relation: edge.relation,
            from_id: edge.from_id,
            to_id: edge.to_id,
            created_at: now,
            last_seen: now,
        };
        inner.by_edge_key.insert(key, stored.id.clone());
        inner
            .outgoing
            .entry(stored.from_id.clone())
            .or_default()
            .push(stored.id.clone());
        inner
            .incoming
            .entry(stored.to_id.clone())
            .or_default()
            .push(stored.id.clone());
        inner.edges.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_entities_by_content(
        &self,
        asset: &Asset,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Entity>, GraphError> {
        let inner = self.read()?;
        let key = (asset.asset_type(), asset.key());
        Ok(inner
            .by_content
            .get(&key)
            .and_then(|id| inner.entities.get(id))
            .filter(|e| since.is_none_or(|s| e.last_seen >= s))
            .cloned()
            .into_iter()
            .collect())
    }

    async fn find_entity_by_id(&self, id: &str) -> Result<Entity, GraphError> {
        self.read()?
            .entities
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::EntityNotFound(id.to_owned()))
    }

    async fn find_entities_by_type(
        &self,
        asset_type: AssetType,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Entity>, GraphError> {
        let inner = self.read()?;
        Ok(inner
            .entities
            .values()
            .filter(|e| e.asset.asset_type() == asset_type)
            .filter(|e| since.is_none_or(|s| e.last_seen >= s))
            .cloned()
            .collect())
    }

    async fn outgoing_edges(
        &self,
        entity: &Entity,
        since: Option<DateTime<Utc>>,
        relations: &[&str],
    ) -> Result<Vec<Edge>, GraphError> {
        let inner = self.read()?;
        Ok(inner.edges_for(&inner.outgoing, &entity.id, since, relations))
    }

    async fn incoming_edges(
        &self,
        entity: &Entity,
        since: Option<DateTime<Utc>>,
        relations: &[&str],
    ) -> Result<Vec<Edge>, GraphError> {
        let inner = self.read()?;
        Ok(inner.edges_for(&inner.incoming, &entity.id, since, relations))
    }

    async fn create_entity_property(
        &self,
        entity: &Entity,
        property: Property,
    ) -> Result<EntityProperty, GraphError> {
        self.insert_entity_property_at(entity, property, Utc::now())
    }

    async fn create_edge_property(
        &self,
        edge: &Edge,
        property: Property,
    ) -> Result<EdgeProperty, GraphError> {
        let now = Utc::now();
        let mut inner = self.write()?;
        if !inner.edges.contains_key(&edge.id) {
            return Err(GraphError::EdgeNotFound(edge.id.clone()));
        }
        let key = property.key();
        let props = inner.edge_props.entry(edge.id.clone()).or_default();
        if let Some(existing) = props.iter_mut().find(|p| p.property.key() == key) {
            existing.last_seen = now;
            return Ok(existing.clone());
        }
        let prop = EdgeProperty {
            id: Uuid::new_v4().to_string(),
            edge_id: edge.id.clone(),
            property,
            created_at: now,
            last_seen: now,
        };
        props.push(prop.clone());
        Ok(prop)
    }

    async fn entity_properties(
        &self,
        entity: &Entity,
        since: Option<DateTime<Utc>>,
        names: &[&str],
    ) -> Result<Vec<EntityProperty>, GraphError> {
        let inner = self.read()?;
        Ok(inner
            .entity_props
            .get(&entity.id)
            .into_iter()
            .flatten()
            .filter(|p| since.is_none_or(|s| p.last_seen >= s))
            .filter(|p| names.is_empty() || names.contains(&p.property.name()))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<GraphStats, GraphError> {
        let inner = self.read()?;
        Ok(GraphStats {
            entities: inner.entities.len(),
            edges: inner.edges.len(),
            properties: inner.entity_props.values().map(Vec::len).sum::<usize>()
                + inner.edge_props.values().map(Vec::len).sum::<usize>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::types::{
        PROP_LAST_MONITORED, PROP_SOURCE, RecordType, Relation, Source, SourceProperty,
    };

    #[tokio::test]
    async fn create_asset_is_idempotent() {
        let graph = MemoryGraph::new();
        let a = graph.create_asset(Asset::fqdn("www.example.com")).await.unwrap();
        let b = graph.create_asset(Asset::fqdn("WWW.EXAMPLE.COM.")).await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(b.last_seen >= a.last_seen);
        assert_eq!(graph.stats().await.unwrap().entities, 1);
    }

    #[tokio::test]
    async fn concurrent_creates_converge() {
        let graph = Arc::new(MemoryGraph::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let g = Arc::clone(&graph);
            handles.push(tokio::spawn(async move {
                g.create_asset(Asset::fqdn("api.example.com")).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn edges_are_idempotent_and_filtered() {
        let graph = MemoryGraph::new();
        let fqdn = graph.create_asset(Asset::fqdn("www.example.com")).await.unwrap();
        let ip = graph
            .create_asset(Asset::ip("1.2.3.4".parse().unwrap()))
            .await
            .unwrap();
        let e1 = graph
            .create_edge(EdgeRequest::new(Relation::dns(RecordType::A, 300), &fqdn, &ip))
            .await
            .unwrap();
        let e2 = graph
            .create_edge(EdgeRequest::new(Relation::dns(RecordType::A, 60), &fqdn, &ip))
            .await
            .unwrap();
        assert_eq!(e1.id, e2.id);

        let out = graph.outgoing_edges(&fqdn, None, &["dns_record"]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(graph.outgoing_edges(&fqdn, None, &["node"]).await.unwrap().is_empty());
        let inc = graph.incoming_edges(&ip, None, &[]).await.unwrap();
        assert_eq!(inc[0].from_id, fqdn.id);
    }

    #[tokio::test]
    async fn edge_to_unknown_entity_is_invalid() {
        let graph = MemoryGraph::new();
        let fqdn = graph.create_asset(Asset::fqdn("a.example.com")).await.unwrap();
        let req = EdgeRequest {
            relation: Relation::simple("node"),
            from_id: fqdn.id.clone(),
            to_id: "missing".to_owned(),
        };
        assert!(matches!(
            graph.create_edge(req).await,
            Err(GraphError::InvalidEdge(_))
        ));
    }

    #[tokio::test]
    async fn properties_filtered_by_name_and_time() {
        let graph = MemoryGraph::new();
        let fqdn = graph.create_asset(Asset::fqdn("www.example.com")).await.unwrap();
        let src = SourceProperty::from(&Source::new("DNS", 100));
        graph
            .create_entity_property(&fqdn, Property::Source(src.clone()))
            .await
            .unwrap();
        let old = Utc::now() - Duration::days(10);
        graph
            .insert_entity_property_at(&fqdn, Property::Monitored(src), old)
            .unwrap();

        let tags = graph.entity_properties(&fqdn, None, &[PROP_SOURCE]).await.unwrap();
        assert_eq!(tags.len(), 1);
        let recent = graph
            .entity_properties(&fqdn, Some(Utc::now() - Duration::days(1)), &[PROP_LAST_MONITORED])
            .await
            .unwrap();
        assert!(recent.is_empty());
        assert_eq!(graph.entity_properties(&fqdn, None, &[]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn find_by_content_respects_since() {
        let graph = MemoryGraph::new();
        graph.create_asset(Asset::fqdn("example.com")).await.unwrap();
        let found = graph
            .find_entities_by_content(&Asset::fqdn("example.com"), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let future = Utc::now() + Duration::hours(1);
        let found = graph
            .find_entities_by_content(&Asset::fqdn("example.com"), Some(future))
            .await
            .unwrap();
        assert!(found.is_empty());
        let by_type = graph
            .find_entities_by_type(AssetType::Fqdn, None)
            .await
            .unwrap();
        assert_eq!(by_type.len(), 1);
    }
}

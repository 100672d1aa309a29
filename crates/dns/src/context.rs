//! DNS 핸들러 공용 상태와 헬퍼

use std::sync::Arc;

use chrono::{DateTime, Utc};
use surveyor_core::metrics as m;
use surveyor_core::types::{AssetType, Entity, REL_DNS_RECORD, RecordType, Source};
use surveyor_engine::ttl::{asset_monitored_within_ttl, ttl_start_time};
use surveyor_engine::{EngineError, Event, Session};
use tracing::debug;

use crate::error::{DNS_SOURCE, DnsError};
use crate::names::SubdomainExtractor;
use crate::resolver::DnsClient;

/// 핸들러 이름
pub const HANDLER_CNAME: &str = "DNS-CNAME";
pub const HANDLER_ADDRESS: &str = "DNS-IP";
pub const HANDLER_TXT: &str = "DNS-TXT";
pub const HANDLER_REVERSE: &str = "DNS-Reverse";
pub const HANDLER_SUBS: &str = "DNS-Subs";
/// 존 레벨 워터마크 이름
pub const ZONE_WATERMARK: &str = "DNS-Zone";

/// 스윕으로 생성된 이벤트의 메타 키
pub const META_SWEPT: &str = "swept";

/// 모든 DNS 핸들러가 공유하는 상태
pub struct DnsContext {
    pub client: Arc<dyn DnsClient>,
    pub names: SubdomainExtractor,
}

impl DnsContext {
    pub fn new(client: Arc<dyn DnsClient>) -> Result<Self, DnsError> {
        Ok(Self {
            client,
            names: SubdomainExtractor::new()?,
        })
    }
}

/// TTL 게이트 판정 결과
#[derive(Debug, Clone, Copy)]
pub(crate) enum Freshness {
    /// 창 안에 워터마크가 있음. 그래프의 기존 결과를 사용
    Cached(DateTime<Utc>),
    Stale,
}

/// DNS 발견의 출처
///
/// `[data_sources.DNS]`의 신뢰도가 0이 아니면 그것을, 아니면 `[dns] confidence`를 씁니다.
pub(crate) fn dns_source(session: &Session) -> Source {
    let config = session.config();
    let confidence = config
        .data_source(DNS_SOURCE)
        .map(|ds| ds.confidence)
        .filter(|c| *c > 0)
        .unwrap_or(config.dns.confidence);
    Source::new(DNS_SOURCE, confidence)
}

/// 핸들러별 모니터링 워터마크 출처
pub(crate) fn watermark(session: &Session, handler: &str) -> Source {
    Source::new(handler, dns_source(session).confidence)
}

/// `from -> to` 전이의 TTL 창 안에서 `handler`가 이미 조회했는지 판정합니다.
pub(crate) async fn freshness(
    session: &Session,
    entity: &Entity,
    to: AssetType,
    handler: &str,
) -> Result<Freshness, EngineError> {
    let from = entity.asset.asset_type();
    let since = ttl_start_time(session.matcher(), from, to.as_str(), DNS_SOURCE)?;
    let mark = watermark(session, handler);
    if asset_monitored_within_ttl(session.graph().as_ref(), entity, &mark, since).await {
        metrics::counter!(m::TTL_CACHE_HITS_TOTAL, m::LABEL_HANDLER => handler.to_owned())
            .increment(1);
        Ok(Freshness::Cached(since))
    } else {
        metrics::counter!(m::TTL_CACHE_MISSES_TOTAL, m::LABEL_HANDLER => handler.to_owned())
            .increment(1);
        Ok(Freshness::Stale)
    }
}

/// `since` 이후 기록된, 지정 레코드 타입의 DNS 엣지 대상 엔티티
pub(crate) async fn cached_targets(
    session: &Session,
    entity: &Entity,
    since: Option<DateTime<Utc>>,
    relation: &str,
    rr_types: &[RecordType],
) -> Result<Vec<Entity>, EngineError> {
    let graph = session.graph();
    let edges = graph.outgoing_edges(entity, since, &[relation]).await?;
    let mut targets = Vec::new();
    for edge in edges {
        if !rr_types.is_empty()
            && !edge
                .relation
                .rr_type()
                .is_some_and(|rr| rr_types.contains(&rr))
        {
            continue;
        }
        match graph.find_entity_by_id(&edge.to_id).await {
            Ok(target) => targets.push(target),
            Err(e) => debug!(edge = %edge.id, error = %e, "cached edge target missing"),
        }
    }
    Ok(targets)
}

/// FQDN이 CNAME 별칭으로 알려져 있는지 확인합니다.
pub(crate) async fn is_alias(session: &Session, entity: &Entity) -> bool {
    match session
        .graph()
        .outgoing_edges(entity, None, &[REL_DNS_RECORD])
        .await
    {
        Ok(edges) => edges
            .iter()
            .any(|e| e.relation.rr_type() == Some(RecordType::Cname)),
        Err(_) => false,
    }
}

/// 이벤트 엔티티의 이름을 꺼냅니다. FQDN이 아니면 `AssetMismatch`.
pub(crate) fn fqdn_name(event: &Event, handler: &str) -> Result<String, EngineError> {
    event
        .entity
        .asset
        .as_fqdn()
        .map(|f| f.name.clone())
        .ok_or_else(|| EngineError::AssetMismatch {
            handler: handler.to_owned(),
            expected: AssetType::Fqdn,
            actual: event.asset_type(),
        })
}

/// 후속 이벤트를 디스패치합니다. 세션 종료 등으로 거부되면 무시합니다.
pub(crate) fn follow(event: &Event, entity: Entity, module: &str) {
    let asset = entity.asset.to_string();
    if let Err(e) = event.session.dispatcher().dispatch(event.child(entity, module)) {
        debug!(module, %asset, error = %e, "follow-up dispatch rejected");
    }
}

/// 스윕 이벤트에 붙이는 메타
pub(crate) fn swept_meta() -> serde_json::Value {
    let mut meta = serde_json::Map::new();
    meta.insert(META_SWEPT.to_owned(), serde_json::Value::Bool(true));
    serde_json::Value::Object(meta)
}

/// 스윕으로 만들어진 이벤트인지 확인합니다.
pub(crate) fn is_swept(event: &Event) -> bool {
    event
        .meta
        .as_ref()
        .and_then(|meta| meta.get(META_SWEPT))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

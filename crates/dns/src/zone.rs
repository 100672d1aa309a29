//! 존 워크 -- 이름에서 등록 도메인까지 레이블 경계마다 NS, MX, SRV 탐색
//!
//! 워크 대상 자격:
//! - 이름이 스코프 안이거나
//! - 스코프 안 이름에서 출발한 NS/MX 레코드가 이 이름을 가리킴
//!
//! 방문한 레벨은 세션에 기록되어 여러 진입점에서 같은 레벨을 다시 걷지 않습니다.
//! 레벨마다 TTL 창 안의 캐시를 먼저 확인하고, 없으면 NS와 MX를 질의한 뒤
//! SRV 이름들을 병렬로 질의합니다.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use surveyor_core::metrics as m;
use surveyor_core::types::{
    Asset, AssetType, Entity, Property, REL_DNS_RECORD, REL_NODE, RecordType, Relation, RrHeader,
    Source,
};
use surveyor_engine::source::{Finding, should_follow, store_finding};
use surveyor_engine::ttl::mark_asset_monitored;
use surveyor_engine::{EngineError, Event, Session};
use tracing::{debug, warn};

use crate::context::{
    DnsContext, Freshness, HANDLER_SUBS, ZONE_WATERMARK, cached_targets, dns_source, follow,
    fqdn_name, freshness, watermark,
};
use crate::names::{registered_domain, zone_levels};
use crate::resolver::{DnsRecord, RecordData};
use crate::srv::SRV_NAMES;

/// 레벨당 동시에 진행하는 SRV 질의 수
pub const SRV_CONCURRENCY: usize = 32;

/// 선언된 스코프 도메인 자체는 주소 해석 여부와 관계없이 존 워크를 시작합니다.
pub(crate) async fn handle_subs(ctx: &DnsContext, event: Event) -> Result<(), EngineError> {
    let name = fqdn_name(&event, HANDLER_SUBS)?;
    if !event.session.scope().domains().contains(&name) {
        return Ok(());
    }
    walk(ctx, &event).await
}

/// 이벤트 FQDN에 대해 존 워크를 수행합니다.
pub(crate) async fn walk(ctx: &DnsContext, event: &Event) -> Result<(), EngineError> {
    let session = &event.session;
    let Some(name) = event.entity.asset.as_fqdn().map(|f| f.name.clone()) else {
        return Ok(());
    };
    if !is_eligible(session, &event.entity).await {
        debug!(fqdn = %name, "zone walk not eligible");
        return Ok(());
    }
    let Some(registered) = registration_point(session, &name) else {
        return Ok(());
    };

    for level in zone_levels(&name, &registered) {
        if session.is_cancelled() {
            break;
        }
        if !session.visit_zone(&level) {
            continue;
        }
        metrics::counter!(m::DNS_ZONE_LEVELS_TOTAL).increment(1);
        match walk_level(ctx, event, &level).await {
            Ok(()) => {}
            // 전이가 허용되지 않으면 모든 레벨이 같으므로 중단
            Err(e) if e.is_benign() => return Err(e),
            Err(e) => warn!(zone = %level, error = %e, "zone level failed"),
        }
    }
    Ok(())
}

/// 존 워크 자격 판정
pub async fn is_eligible(session: &Session, entity: &Entity) -> bool {
    let scope = session.scope();
    if scope.is_asset_in_scope(&entity.asset, 0).0.is_some() {
        return true;
    }

    let graph = session.graph();
    let Ok(edges) = graph.incoming_edges(entity, None, &[REL_DNS_RECORD]).await else {
        return false;
    };
    for edge in edges {
        if !matches!(
            edge.relation.rr_type(),
            Some(RecordType::Ns) | Some(RecordType::Mx)
        ) {
            continue;
        }
        if let Ok(from) = graph.find_entity_by_id(&edge.from_id).await {
            if scope.is_asset_in_scope(&from.asset, 0).0.is_some() {
                return true;
            }
        }
    }
    false
}

/// 워크를 멈출 등록 도메인. 공개 접미사 목록에 없으면 가장 구체적인 스코프 도메인
fn registration_point(session: &Session, name: &str) -> Option<String> {
    registered_domain(name).or_else(|| session.scope().matching_domain(name))
}

async fn walk_level(ctx: &DnsContext, event: &Event, level: &str) -> Result<(), EngineError> {
    let session = &event.session;
    let graph = session.graph();
    let source = dns_source(session);

    let level_entity = graph.create_asset(Asset::fqdn(level)).await?;
    graph
        .create_entity_property(&level_entity, Property::Source((&source).into()))
        .await?;

    if let Freshness::Cached(since) =
        freshness(session, &level_entity, AssetType::Fqdn, ZONE_WATERMARK).await?
    {
        return replay_level(event, &level_entity, level, since).await;
    }

    let mut targets = Vec::new();

    let ns = ctx.client.query(level, RecordType::Ns).await?;
    for record in ns {
        if record.rr_type != RecordType::Ns || record.name != level {
            continue;
        }
        let RecordData::Name(server) = record.data else {
            continue;
        };
        session.add_apex(level);
        let finding = Finding::new(Asset::fqdn(&server), Relation::dns(RecordType::Ns, record.ttl));
        match store_finding(session, &level_entity, &source, finding).await {
            Ok(entity) => targets.push(entity),
            Err(e) => warn!(zone = %level, ns = %server, error = %e, "name server dropped"),
        }
    }
    if session.is_cancelled() {
        return Ok(());
    }

    let mx = ctx.client.query(level, RecordType::Mx).await?;
    for record in mx {
        if record.rr_type != RecordType::Mx || record.name != level {
            continue;
        }
        let RecordData::Mx {
            preference,
            exchange,
        } = record.data
        else {
            continue;
        };
        let relation = Relation::PrefDns {
            name: REL_DNS_RECORD.to_owned(),
            header: RrHeader::new(RecordType::Mx, record.ttl),
            preference,
        };
        match store_finding(session, &level_entity, &source, Finding::new(Asset::fqdn(&exchange), relation)).await {
            Ok(entity) => targets.push(entity),
            Err(e) => warn!(zone = %level, mx = %exchange, error = %e, "mail exchange dropped"),
        }
    }

    // 인프라 이름은 스코프 밖이어도 추적 (워크 자격은 NS/MX 엣지로 판정)
    for target in targets {
        follow(event, target, ZONE_WATERMARK);
    }

    let services = srv_fanout(ctx, event, &level_entity, level, &source).await;
    debug!(zone = %level, services, "zone level walked");

    if session.is_cancelled() {
        return Ok(());
    }
    let mark = watermark(session, ZONE_WATERMARK);
    mark_asset_monitored(graph.as_ref(), &level_entity, &mark).await
}

/// 창 안에서 이미 걸었던 레벨: 그래프의 NS/MX/서비스 이름을 다시 디스패치합니다.
async fn replay_level(
    event: &Event,
    level_entity: &Entity,
    level: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<(), EngineError> {
    let session = &event.session;
    let ns = cached_targets(session, level_entity, Some(since), REL_DNS_RECORD, &[RecordType::Ns]).await?;
    if !ns.is_empty() {
        session.add_apex(level);
    }
    let mx = cached_targets(session, level_entity, Some(since), REL_DNS_RECORD, &[RecordType::Mx]).await?;
    for target in ns.into_iter().chain(mx) {
        follow(event, target, ZONE_WATERMARK);
    }
    for service in cached_targets(session, level_entity, Some(since), REL_NODE, &[]).await? {
        if should_follow(session, &service.asset) {
            follow(event, service, ZONE_WATERMARK);
        }
    }
    Ok(())
}

/// 레벨 아래 SRV 이름들을 병렬로 질의하고 결과를 기록합니다. 발견한 서비스 수를 반환합니다.
async fn srv_fanout(
    ctx: &DnsContext,
    event: &Event,
    level_entity: &Entity,
    level: &str,
    source: &Source,
) -> usize {
    let session = &event.session;
    let names: Vec<String> = SRV_NAMES
        .iter()
        .map(|label| format!("{label}.{level}"))
        .collect();
    let client = Arc::clone(&ctx.client);
    let cancel = session.cancel_token().clone();
    let mut answers = stream::iter(names)
        .map(move |name: String| {
            let client = Arc::clone(&client);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return (name, Ok(Vec::new()));
                }
                let result = client.query(&name, RecordType::Srv).await;
                (name, result)
            }
        })
        .buffer_unordered(SRV_CONCURRENCY);

    let mut services = 0;
    while let Some((name, result)) = answers.next().await {
        if session.is_cancelled() {
            break;
        }
        let records: Vec<DnsRecord> = match result {
            Ok(records) => records
                .into_iter()
                .filter(|r| r.rr_type == RecordType::Srv && r.name == name)
                .collect(),
            Err(e) => {
                debug!(service = %name, error = %e, "srv query failed");
                continue;
            }
        };
        if records.is_empty() {
            continue;
        }
        match store_service(event, level_entity, &name, records, source).await {
            Ok(()) => services += 1,
            Err(e) => warn!(service = %name, error = %e, "service dropped"),
        }
    }
    services
}

async fn store_service(
    event: &Event,
    level_entity: &Entity,
    name: &str,
    records: Vec<DnsRecord>,
    source: &Source,
) -> Result<(), EngineError> {
    let session = &event.session;
    let service = store_finding(
        session,
        level_entity,
        source,
        Finding::new(Asset::fqdn(name), Relation::simple(REL_NODE)),
    )
    .await?;

    for record in records {
        let RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } = record.data
        else {
            continue;
        };
        // "." 대상은 서비스 없음
        let target = surveyor_core::types::normalize_name(&target);
        if target.is_empty() {
            continue;
        }
        let relation = Relation::SrvDns {
            name: REL_DNS_RECORD.to_owned(),
            header: RrHeader::new(RecordType::Srv, record.ttl),
            priority,
            weight,
            port,
        };
        let entity = store_finding(session, &service, source, Finding::new(Asset::fqdn(&target), relation)).await?;
        if should_follow(session, &entity.asset) {
            follow(event, entity, ZONE_WATERMARK);
        }
    }

    if should_follow(session, &service.asset) {
        follow(event, service, ZONE_WATERMARK);
    }
    Ok(())
}

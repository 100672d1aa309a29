//! 역방향 DNS (PTR) 핸들러
//!
//! 예약 대역 주소는 건너뜁니다. PTR 값은 정확히 하나의 하위 도메인 토큰으로
//! 이루어진 경우에만 받아들이며, 받아들인 이름은 정방향 해석과 같은 스윕
//! 크기 규칙으로 주소 주변을 스윕합니다. 스윕으로 생긴 주소는 다시 스윕하지 않습니다.

use surveyor_core::metrics as m;
use surveyor_core::net::is_reserved;
use surveyor_core::types::{Asset, AssetType, Entity, Property, REL_DNS_RECORD, RecordType, Relation};
use surveyor_engine::source::{Finding, should_follow, store_finding};
use surveyor_engine::ttl::mark_asset_monitored;
use surveyor_engine::{EngineError, Event};
use tracing::{debug, warn};

use crate::context::{
    DnsContext, Freshness, HANDLER_REVERSE, cached_targets, dns_source, follow, freshness,
    is_swept, watermark,
};
use crate::names::reverse_name;
use crate::resolver::RecordData;
use crate::sweep::run_sweep;

pub(crate) async fn handle(ctx: &DnsContext, event: Event) -> Result<(), EngineError> {
    let Some(ip) = event.entity.asset.as_ip().map(|v| v.address) else {
        return Err(EngineError::AssetMismatch {
            handler: HANDLER_REVERSE.to_owned(),
            expected: AssetType::IpAddress,
            actual: event.asset_type(),
        });
    };
    if is_reserved(&ip) {
        debug!(%ip, "reserved address skipped");
        return Ok(());
    }

    let session = &event.session;
    let graph = session.graph();
    let source = dns_source(session);

    let gate = freshness(session, &event.entity, AssetType::Fqdn, HANDLER_REVERSE).await?;

    // 역방향 이름은 PTR 엣지의 출발점이 되는 자리표시 FQDN
    let rev = reverse_name(&ip);
    let rev_entity = graph.create_asset(Asset::fqdn(&rev)).await?;
    graph
        .create_entity_property(&rev_entity, Property::Source((&source).into()))
        .await?;

    let targets: Vec<Entity> = match gate {
        Freshness::Cached(since) => {
            cached_targets(
                session,
                &rev_entity,
                Some(since),
                REL_DNS_RECORD,
                &[RecordType::Ptr],
            )
            .await?
        }
        Freshness::Stale => {
            let records = ctx
                .client
                .query(&rev, RecordType::Ptr)
                .await
                .map_err(EngineError::from)?;
            let mut targets = Vec::new();
            for record in records {
                if record.rr_type != RecordType::Ptr || record.name != rev {
                    continue;
                }
                let RecordData::Name(raw) = record.data else {
                    continue;
                };
                let Some(target) = ctx.names.single_name(&raw) else {
                    metrics::counter!(m::DNS_PTR_REJECTED_TOTAL).increment(1);
                    debug!(%ip, ptr = %raw, "malformed ptr value rejected");
                    continue;
                };
                let finding = Finding::new(
                    Asset::fqdn(&target),
                    Relation::dns(RecordType::Ptr, record.ttl),
                );
                match store_finding(session, &rev_entity, &source, finding).await {
                    Ok(entity) => targets.push(entity),
                    Err(e) => warn!(%ip, ptr = %target, error = %e, "ptr dropped"),
                }
            }
            let mark = watermark(session, HANDLER_REVERSE);
            mark_asset_monitored(graph.as_ref(), &event.entity, &mark).await?;
            targets
        }
    };

    if targets.is_empty() {
        return Ok(());
    }

    // 스윕된 주소는 다시 스윕하지 않고, 주소당 스윕은 한 번
    let mut sweep_pending = !is_swept(&event);
    for target in targets {
        if session.is_cancelled() {
            break;
        }
        if !should_follow(session, &target.asset) {
            continue;
        }
        let asset = target.asset.clone();
        follow(&event, target, HANDLER_REVERSE);
        if sweep_pending
            && run_sweep(&event, &asset, &event.entity, &source, HANDLER_REVERSE).await > 0
        {
            sweep_pending = false;
        }
    }
    Ok(())
}

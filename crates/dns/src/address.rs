//! A/AAAA 해석 핸들러
//!
//! CNAME 별칭인 이름은 해석하지 않습니다. 별칭 체인은 CNAME 핸들러의
//! 재귀 디스패치로 풀립니다. 해석에 성공하면 주소마다 IP 스윕을 하고,
//! 이어서 존 워크와 apex 연결을 수행합니다.

use surveyor_core::types::{Asset, AssetType, Entity, REL_DNS_RECORD, RecordType, Relation, Source};
use surveyor_engine::source::{Finding, store_finding};
use surveyor_engine::ttl::mark_asset_monitored;
use surveyor_engine::{EngineError, Event, Session};
use tracing::{debug, warn};

use crate::apex::link_apex;
use crate::context::{
    DnsContext, Freshness, HANDLER_ADDRESS, cached_targets, dns_source, fqdn_name, follow,
    freshness, is_alias, watermark,
};
use crate::error::DnsError;
use crate::resolver::RecordData;
use crate::sweep::run_sweep;
use crate::zone;

pub(crate) async fn handle(ctx: &DnsContext, event: Event) -> Result<(), EngineError> {
    let name = fqdn_name(&event, HANDLER_ADDRESS)?;
    let session = &event.session;

    if is_alias(session, &event.entity).await {
        debug!(fqdn = %name, "alias skipped for address resolution");
        return Ok(());
    }

    let addresses = match freshness(session, &event.entity, AssetType::IpAddress, HANDLER_ADDRESS).await? {
        Freshness::Cached(since) => {
            cached_targets(
                session,
                &event.entity,
                Some(since),
                REL_DNS_RECORD,
                &[RecordType::A, RecordType::Aaaa],
            )
            .await?
        }
        Freshness::Stale => {
            let source = dns_source(session);
            let (resolved, failure) = resolve(ctx, session, &event.entity, &name, &source).await;
            match failure {
                None => {
                    let mark = watermark(session, HANDLER_ADDRESS);
                    mark_asset_monitored(session.graph().as_ref(), &event.entity, &mark).await?;
                }
                Some(e) if resolved.is_empty() => return Err(e.into()),
                Some(e) => debug!(fqdn = %name, error = %e, "partial resolution"),
            }
            resolved
        }
    };

    if addresses.is_empty() {
        return Ok(());
    }
    after_resolution(ctx, &event, &addresses).await;
    Ok(())
}

/// A, AAAA 레코드를 질의해 주소 엔티티를 기록합니다.
///
/// 응답의 소유자 이름이 질의 이름과 같은 레코드만 받아들입니다. 응답에
/// 질의 이름 소유의 CNAME이 있으면 별칭이므로 주소를 기록하지 않습니다.
async fn resolve(
    ctx: &DnsContext,
    session: &Session,
    entity: &Entity,
    name: &str,
    source: &Source,
) -> (Vec<Entity>, Option<DnsError>) {
    let mut found = Vec::new();
    let mut failure = None;
    for rr_type in [RecordType::A, RecordType::Aaaa] {
        if session.is_cancelled() {
            break;
        }
        let records = match ctx.client.query(name, rr_type).await {
            Ok(records) => records,
            Err(e) => {
                failure = Some(e);
                continue;
            }
        };
        if records
            .iter()
            .any(|r| r.rr_type == RecordType::Cname && r.name == name)
        {
            debug!(fqdn = %name, "answer is an alias chain");
            return (Vec::new(), None);
        }

        for record in records {
            if record.rr_type != rr_type || record.name != name {
                continue;
            }
            let RecordData::Address(ip) = record.data else {
                continue;
            };
            let finding = Finding::new(Asset::ip(ip), Relation::dns(rr_type, record.ttl));
            match store_finding(session, entity, source, finding).await {
                Ok(addr) => found.push(addr),
                Err(e) => warn!(fqdn = %name, %ip, error = %e, "address dropped"),
            }
        }
    }
    (found, failure)
}

/// 해석된 주소를 디스패치하고 스윕, 존 워크, apex 연결을 수행합니다.
async fn after_resolution(ctx: &DnsContext, event: &Event, addresses: &[Entity]) {
    let session = &event.session;
    let source = dns_source(session);

    for addr in addresses {
        follow(event, addr.clone(), HANDLER_ADDRESS);
    }
    for addr in addresses {
        if session.is_cancelled() {
            return;
        }
        run_sweep(event, &event.entity.asset, addr, &source, HANDLER_ADDRESS).await;
    }

    if let Err(e) = zone::walk(ctx, event).await {
        if !e.is_benign() {
            warn!(fqdn = %event.entity.asset, error = %e, "zone walk failed");
        }
    }
    if let Err(e) = link_apex(session, &event.entity).await {
        warn!(fqdn = %event.entity.asset, error = %e, "apex link failed");
    }
}

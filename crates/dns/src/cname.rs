//! CNAME 추적 핸들러
//!
//! 별칭 엣지를 만들고 대상을 새 이벤트로 디스패치합니다. 여러 단계의
//! 별칭은 디스패처의 재귀 디스패치로 풀리며, 순환은 세션 중복 제거가 끊습니다.

use surveyor_core::types::{Asset, AssetType, REL_DNS_RECORD, RecordType, Relation, normalize_name};
use surveyor_engine::source::{Finding, store_finding};
use surveyor_engine::ttl::mark_asset_monitored;
use surveyor_engine::{EngineError, Event};
use tracing::{debug, warn};

use crate::context::{
    DnsContext, Freshness, HANDLER_CNAME, cached_targets, dns_source, fqdn_name, follow,
    freshness, watermark,
};
use crate::resolver::RecordData;

pub(crate) async fn handle(ctx: &DnsContext, event: Event) -> Result<(), EngineError> {
    let name = fqdn_name(&event, HANDLER_CNAME)?;
    let session = &event.session;

    let targets = match freshness(session, &event.entity, AssetType::Fqdn, HANDLER_CNAME).await? {
        Freshness::Cached(since) => {
            cached_targets(
                session,
                &event.entity,
                Some(since),
                REL_DNS_RECORD,
                &[RecordType::Cname],
            )
            .await?
        }
        Freshness::Stale => {
            let records = ctx
                .client
                .query(&name, RecordType::Cname)
                .await
                .map_err(EngineError::from)?;
            let source = dns_source(session);
            let mut targets = Vec::new();
            for record in records {
                if record.rr_type != RecordType::Cname || record.name != name {
                    continue;
                }
                let RecordData::Name(target) = record.data else {
                    continue;
                };
                let target = normalize_name(&target);
                if target.is_empty() || target == name {
                    continue;
                }
                let finding = Finding::new(
                    Asset::fqdn(&target),
                    Relation::dns(RecordType::Cname, record.ttl),
                );
                match store_finding(session, &event.entity, &source, finding).await {
                    Ok(entity) => targets.push(entity),
                    Err(e) => warn!(fqdn = %name, target = %target, error = %e, "alias dropped"),
                }
            }
            let mark = watermark(session, HANDLER_CNAME);
            mark_asset_monitored(session.graph().as_ref(), &event.entity, &mark).await?;
            targets
        }
    };

    for target in targets {
        debug!(fqdn = %name, target = %target.asset, "following alias");
        follow(&event, target, HANDLER_CNAME);
    }
    Ok(())
}

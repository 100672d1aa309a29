//! TXT 레코드 핸들러 -- 스코프 안 이름의 TXT 값을 엔티티 속성으로 기록

use surveyor_core::types::{AssetType, Property, RecordType, RrHeader};
use surveyor_engine::ttl::mark_asset_monitored;
use surveyor_engine::{EngineError, Event};
use tracing::{debug, warn};

use crate::context::{DnsContext, Freshness, HANDLER_TXT, fqdn_name, freshness, watermark};
use crate::resolver::RecordData;

pub(crate) async fn handle(ctx: &DnsContext, event: Event) -> Result<(), EngineError> {
    let name = fqdn_name(&event, HANDLER_TXT)?;
    let session = &event.session;

    if session
        .scope()
        .is_asset_in_scope(&event.entity.asset, 0)
        .0
        .is_none()
    {
        return Ok(());
    }
    if let Freshness::Cached(_) =
        freshness(session, &event.entity, AssetType::Fqdn, HANDLER_TXT).await?
    {
        return Ok(());
    }

    let records = ctx
        .client
        .query(&name, RecordType::Txt)
        .await
        .map_err(EngineError::from)?;
    let graph = session.graph();
    let mut stored = 0usize;
    for record in records {
        if record.rr_type != RecordType::Txt || record.name != name {
            continue;
        }
        let RecordData::Txt(data) = record.data else {
            continue;
        };
        let property = Property::DnsRecord {
            header: RrHeader::new(RecordType::Txt, record.ttl),
            data,
        };
        match graph.create_entity_property(&event.entity, property).await {
            Ok(_) => stored += 1,
            Err(e) => warn!(fqdn = %name, error = %e, "txt record dropped"),
        }
    }
    debug!(fqdn = %name, stored, "txt records stored");

    let mark = watermark(session, HANDLER_TXT);
    mark_asset_monitored(graph.as_ref(), &event.entity, &mark).await
}

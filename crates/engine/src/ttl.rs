//! TTL 신선도 게이트
//!
//! 외부 소스에 다시 질의할지, 그래프에 이미 있는 결과를 재사용할지 결정합니다.
//!
//! - [`ttl_start_time`]: 이 시각 이전에 수집된 결과는 오래된 것으로 봅니다.
//! - [`asset_monitored_within_ttl`]: 엔티티가 해당 소스로 최근에 조회되었는지 확인합니다.
//! - [`mark_asset_monitored`]: 능동 조회 후 워터마크를 기록합니다.
//!
//! TTL 우선순위는 (1) 규칙이 대상으로 지정한 데이터 소스 자신의 TTL, (2) 변환
//! 규칙의 TTL, (3) 전역 기본값입니다. 어떤 규칙도 모듈을 대상으로 삼지 않으면
//! 모듈에 TTL이 설정되어 있어도 (1)은 적용되지 않습니다.

use chrono::{DateTime, Duration, Utc};
use surveyor_core::graph::AssetGraph;
use surveyor_core::transform::TransformationSet;
use surveyor_core::types::{AssetType, Entity, PROP_LAST_MONITORED, Property, Source};
use tracing::debug;

use crate::error::EngineError;

/// `from`에서 `to`로의 전이에 대해 캐시가 유효한 시작 시각을 계산합니다.
///
/// 전이가 허용되지 않으면 `TransformMismatch`를 반환합니다.
pub fn ttl_start_time(
    matcher: &TransformationSet,
    from: AssetType,
    to: &str,
    module: &str,
) -> Result<DateTime<Utc>, EngineError> {
    let mismatch = || EngineError::TransformMismatch {
        from: from.to_string(),
        to: to.to_owned(),
    };

    let matches = matcher
        .check(from.as_str(), &[to, module])
        .map_err(|_| mismatch())?;
    if !matches.is_match(to) {
        return Err(mismatch());
    }

    let module_ttl = if matches.is_match(module) {
        matcher.source_ttl(module)
    } else {
        None
    };
    let ttl = module_ttl
        .or_else(|| matches.ttl(to))
        .unwrap_or(matcher.default_ttl());
    Ok(Utc::now() - Duration::minutes(i64::from(ttl)))
}

/// 엔티티에 `since` 이후의 해당 소스 모니터링 워터마크가 있는지 확인합니다.
///
/// 그래프 조회 실패는 캐시 미스로 취급합니다.
pub async fn asset_monitored_within_ttl(
    graph: &dyn AssetGraph,
    entity: &Entity,
    source: &Source,
    since: DateTime<Utc>,
) -> bool {
    match graph
        .entity_properties(entity, Some(since), &[PROP_LAST_MONITORED])
        .await
    {
        Ok(props) => props.iter().any(|p| {
            matches!(&p.property, Property::Monitored(m) if m.source.eq_ignore_ascii_case(&source.name))
        }),
        Err(e) => {
            debug!(entity = %entity.asset, source = %source.name, error = %e, "watermark lookup failed");
            false
        }
    }
}

/// 엔티티에 현재 시각의 모니터링 워터마크를 기록합니다.
pub async fn mark_asset_monitored(
    graph: &dyn AssetGraph,
    entity: &Entity,
    source: &Source,
) -> Result<(), EngineError> {
    graph
        .create_entity_property(entity, Property::Monitored(source.into()))
        .await?;
    Ok(())
}

//! IP 스윕 -- 해석된 주소 주변의 이웃 주소를 생성해 다시 디스패치
//!
//! 스윕 크기는 스코프 판정과 능동 모드 여부로 정해집니다.
//!
//! | 조건 | 크기 |
//! |------|------|
//! | 이름도 IP도 스코프 밖 | 0 |
//! | 능동 모드 | [`MAX_SWEEP_SIZE`] |
//! | IP가 스코프 안 | [`SECOND_SWEEP_SIZE`] |
//! | 이름만 스코프 안 | [`FIRST_SWEEP_SIZE`] |

use std::net::IpAddr;

use surveyor_core::metrics as m;
use surveyor_core::net::{Cidr, addr_to_u128, u128_to_addr};
use surveyor_core::scope::ScopeChecker;
use surveyor_core::types::{Asset, Entity, Property, REL_CONTAINS, Source};
use surveyor_engine::{EngineError, Event, Session};
use tracing::{debug, warn};

use crate::context::swept_meta;

pub const FIRST_SWEEP_SIZE: usize = 25;
pub const SECOND_SWEEP_SIZE: usize = 100;
pub const MAX_SWEEP_SIZE: usize = 250;

/// 블록 정보가 없을 때의 기본 프리픽스
pub const DEFAULT_V4_PREFIX: u8 = 18;
pub const DEFAULT_V6_PREFIX: u8 = 64;

/// 이름과 주소의 스코프 판정으로 스윕 크기를 정합니다.
pub fn sweep_size(scope: &dyn ScopeChecker, name: &Asset, ip: &IpAddr) -> usize {
    let ip_in_scope = scope.is_asset_in_scope(&Asset::ip(*ip), 0).0.is_some();
    let name_in_scope = scope.is_asset_in_scope(name, 0).0.is_some();
    if !ip_in_scope && !name_in_scope {
        0
    } else if scope.is_active() {
        MAX_SWEEP_SIZE
    } else if ip_in_scope {
        SECOND_SWEEP_SIZE
    } else {
        FIRST_SWEEP_SIZE
    }
}

/// 주소를 포함하는 가장 작은 넷블록. 그래프에 없으면 기본 블록
pub async fn containing_block(session: &Session, ip_entity: &Entity) -> Result<Cidr, EngineError> {
    let Some(ip) = ip_entity.asset.as_ip().map(|v| v.address) else {
        return Err(EngineError::AssetMismatch {
            handler: "sweep".to_owned(),
            expected: surveyor_core::types::AssetType::IpAddress,
            actual: ip_entity.asset.asset_type(),
        });
    };

    let graph = session.graph();
    let mut best: Option<Cidr> = None;
    for edge in graph.incoming_edges(ip_entity, None, &[REL_CONTAINS]).await? {
        let Ok(from) = graph.find_entity_by_id(&edge.from_id).await else {
            continue;
        };
        if let Some(block) = from.asset.as_netblock().map(|n| n.cidr) {
            if block.contains(&ip) && best.is_none_or(|b| block.prefix() > b.prefix()) {
                best = Some(block);
            }
        }
    }

    match best {
        Some(block) => Ok(block),
        None => {
            let prefix = match ip {
                IpAddr::V4(_) => DEFAULT_V4_PREFIX,
                IpAddr::V6(_) => DEFAULT_V6_PREFIX,
            };
            Ok(Cidr::new(ip, prefix).unwrap_or_else(|_| Cidr::host(ip)))
        }
    }
}

/// 블록 안에서 `ip`에 가장 가까운 주소 `size`개 (아래, 위 번갈아, `ip` 제외)
pub fn sweep_addresses(ip: &IpAddr, block: &Cidr, size: usize) -> Vec<IpAddr> {
    let center = addr_to_u128(ip);
    let (low, high) = block.bounds();
    let mut out = Vec::with_capacity(size);
    let mut distance: u128 = 1;
    while out.len() < size {
        let below = center.checked_sub(distance).filter(|v| *v >= low);
        let above = center.checked_add(distance).filter(|v| *v <= high);
        if below.is_none() && above.is_none() {
            break;
        }
        for value in [below, above].into_iter().flatten() {
            if out.len() < size {
                out.push(u128_to_addr(value, ip));
            }
        }
        distance += 1;
    }
    out
}

/// `ip_entity` 주변을 스윕해 주소 엔티티를 만들고 디스패치합니다.
///
/// 반복마다 취소 신호를 확인하며, 만들어진 주소 수를 반환합니다.
pub async fn run_sweep(
    event: &Event,
    name: &Asset,
    ip_entity: &Entity,
    source: &Source,
    module: &str,
) -> usize {
    let session = &event.session;
    let Some(ip) = ip_entity.asset.as_ip().map(|v| v.address) else {
        return 0;
    };
    let size = sweep_size(session.scope().as_ref(), name, &ip);
    if size == 0 {
        debug!(%ip, name = %name, "sweep skipped: out of scope");
        return 0;
    }

    let block = match containing_block(session, ip_entity).await {
        Ok(block) => block,
        Err(e) => {
            warn!(%ip, error = %e, "sweep block lookup failed");
            return 0;
        }
    };

    let graph = session.graph();
    let mut created = 0;
    for addr in sweep_addresses(&ip, &block, size) {
        if session.is_cancelled() {
            break;
        }
        let entity = match graph.create_asset(Asset::ip(addr)).await {
            Ok(entity) => entity,
            Err(e) => {
                warn!(%addr, error = %e, "swept address dropped");
                continue;
            }
        };
        if let Err(e) = graph
            .create_entity_property(&entity, Property::Source(source.into()))
            .await
        {
            warn!(%addr, error = %e, "swept address provenance dropped");
        }
        created += 1;
        let child = event
            .child(entity, module)
            .with_meta(swept_meta());
        if let Err(e) = session.dispatcher().dispatch(child) {
            debug!(%addr, error = %e, "swept address dispatch rejected");
        }
    }

    metrics::counter!(m::DNS_SWEEP_ADDRESSES_TOTAL).increment(created as u64);
    debug!(%ip, %block, size, created, "sweep complete");
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use surveyor_core::config::SurveyorConfig;
    use surveyor_core::graph::{AssetGraph, MemoryGraph};
    use surveyor_core::scope::Scope;
    use surveyor_core::types::{EdgeRequest, Relation};
    use surveyor_engine::Dispatcher;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn size_follows_scope_and_mode() {
        let mut scope = Scope::with_domains(["example.com"]).unwrap();
        let www = Asset::fqdn("www.example.com");
        let other = Asset::fqdn("www.other.org");

        assert_eq!(sweep_size(&scope, &www, &ip("1.2.3.4")), FIRST_SWEEP_SIZE);
        assert_eq!(sweep_size(&scope, &other, &ip("1.2.3.4")), 0);

        scope.add_cidr("1.2.3.0/24".parse().unwrap());
        assert_eq!(sweep_size(&scope, &other, &ip("1.2.3.4")), SECOND_SWEEP_SIZE);

        scope.set_active(true);
        assert_eq!(sweep_size(&scope, &www, &ip("1.2.3.4")), MAX_SWEEP_SIZE);
        assert_eq!(sweep_size(&scope, &other, &ip("9.9.9.9")), 0);
    }

    #[test]
    fn addresses_alternate_around_center() {
        let block: Cidr = "10.0.0.0/24".parse().unwrap();
        let out = sweep_addresses(&ip("10.0.0.10"), &block, 4);
        assert_eq!(
            out,
            vec![ip("10.0.0.9"), ip("10.0.0.11"), ip("10.0.0.8"), ip("10.0.0.12")]
        );
    }

    #[test]
    fn addresses_stay_inside_block() {
        let block: Cidr = "10.0.0.0/30".parse().unwrap();
        let out = sweep_addresses(&ip("10.0.0.0"), &block, 25);
        assert_eq!(out, vec![ip("10.0.0.1"), ip("10.0.0.2"), ip("10.0.0.3")]);
    }

    #[test]
    fn v6_addresses() {
        let block: Cidr = "2606:4700::/64".parse().unwrap();
        let out = sweep_addresses(&ip("2606:4700::10"), &block, 2);
        assert_eq!(out, vec![ip("2606:4700::f"), ip("2606:4700::11")]);
    }

    #[tokio::test]
    async fn smallest_known_block_is_used() {
        let graph = Arc::new(MemoryGraph::new());
        let session = Session::new(
            Arc::new(SurveyorConfig::default()),
            graph.clone(),
            Arc::new(Scope::default()),
            Arc::new(Dispatcher::new(2)),
        )
        .unwrap();

        let addr = graph.create_asset(Asset::ip(ip("1.2.3.4"))).await.unwrap();
        assert_eq!(
            containing_block(&session, &addr).await.unwrap(),
            "1.2.0.0/18".parse::<Cidr>().unwrap()
        );

        for block in ["1.2.0.0/16", "1.2.3.0/24"] {
            let nb = graph
                .create_asset(Asset::netblock(block.parse().unwrap()))
                .await
                .unwrap();
            graph
                .create_edge(EdgeRequest::new(Relation::simple(REL_CONTAINS), &nb, &addr))
                .await
                .unwrap();
        }
        assert_eq!(
            containing_block(&session, &addr).await.unwrap(),
            "1.2.3.0/24".parse::<Cidr>().unwrap()
        );
    }
}

//! Apex (존 경계) 판정
//!
//! NS 레코드를 가진 것으로 알려진 이름들 중에서 FQDN을 소유하는 존을 고르고,
//! apex에서 FQDN으로 `node` 엣지를 연결합니다.

use surveyor_core::config::ApexMatching;
use surveyor_core::types::{Asset, Entity, REL_NODE, Relation};
use surveyor_engine::source::{Finding, store_finding};
use surveyor_engine::{EngineError, Session};
use tracing::debug;

use crate::context::dns_source;

/// 후보 중 `name`을 소유하는 apex를 고릅니다.
///
/// - `Substring`: 후보가 `name` 안에 나타나는 모든 위치 중 0이 아닌 가장 작은
///   오프셋을 가진 후보. 같은 오프셋이면 더 긴 후보.
/// - `Label`: 오프셋이 레이블 경계에서 시작하고 이름 끝까지 이어지는 경우만 인정
pub fn find_apex<S: AsRef<str>>(
    name: &str,
    candidates: &[S],
    mode: ApexMatching,
) -> Option<String> {
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let Some(offset) = smallest_offset(name, candidate, mode) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((o, c)) => offset < o || (offset == o && candidate.len() > c.len()),
        };
        if better {
            best = Some((offset, candidate));
        }
    }
    best.map(|(_, c)| c.to_owned())
}

fn smallest_offset(name: &str, candidate: &str, mode: ApexMatching) -> Option<usize> {
    if candidate.is_empty() || candidate.len() >= name.len() {
        return None;
    }
    match mode {
        ApexMatching::Substring => {
            // 겹치는 출현까지 모두 검사
            (1..=name.len() - candidate.len())
                .find(|&i| name.is_char_boundary(i) && name[i..].starts_with(candidate))
        }
        ApexMatching::Label => {
            let offset = name.len() - candidate.len();
            (name.ends_with(candidate) && name.as_bytes()[offset - 1] == b'.').then_some(offset)
        }
    }
}

/// 세션의 apex 후보로 엔티티의 존을 찾아 `node` 엣지로 연결합니다.
pub async fn link_apex(session: &Session, entity: &Entity) -> Result<Option<Entity>, EngineError> {
    let Some(fqdn) = entity.asset.as_fqdn() else {
        return Ok(None);
    };
    let candidates = session.apex_candidates();
    let mode = session.config().engine.apex_matching;
    let Some(apex) = find_apex(&fqdn.name, &candidates, mode) else {
        return Ok(None);
    };

    let source = dns_source(session);
    let apex_entity = session.graph().create_asset(Asset::fqdn(&apex)).await?;
    store_finding(
        session,
        &apex_entity,
        &source,
        Finding::new(entity.asset.clone(), Relation::simple(REL_NODE)),
    )
    .await?;
    debug!(fqdn = %fqdn.name, apex = %apex, "linked under apex");
    Ok(Some(apex_entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_zone_wins() {
        let candidates = ["example.com", "b.example.com"];
        assert_eq!(
            find_apex("a.b.example.com", &candidates, ApexMatching::Substring).as_deref(),
            Some("b.example.com")
        );
    }

    #[test]
    fn smallest_non_zero_offset_across_repeated_occurrences() {
        // "com"은 오프셋 0과 12에 나타나지만 0은 제외되므로 12
        let candidates = ["com", "example.com"];
        assert_eq!(
            find_apex("com.example.com", &candidates, ApexMatching::Substring).as_deref(),
            Some("example.com")
        );
        // "ab.ab.c"는 오프셋 5, "ab.c"는 8
        let candidates = ["ab.ab.c", "ab.c"];
        assert_eq!(
            find_apex("x.ab.ab.ab.c", &candidates, ApexMatching::Substring).as_deref(),
            Some("ab.ab.c")
        );
    }

    #[test]
    fn name_itself_is_not_its_own_apex() {
        let candidates = ["example.com"];
        assert_eq!(
            find_apex("example.com", &candidates, ApexMatching::Substring),
            None
        );
    }

    #[test]
    fn substring_mode_can_match_inside_a_label() {
        let candidates = ["ample.com"];
        assert_eq!(
            find_apex("www.example.com", &candidates, ApexMatching::Substring).as_deref(),
            Some("ample.com")
        );
        assert_eq!(
            find_apex("www.example.com", &candidates, ApexMatching::Label),
            None
        );
    }

    #[test]
    fn label_mode_requires_suffix() {
        let candidates = ["example.com", "b.example.com"];
        assert_eq!(
            find_apex("a.b.example.com", &candidates, ApexMatching::Label).as_deref(),
            Some("b.example.com")
        );
        let candidates = ["example.co"];
        assert_eq!(
            find_apex("www.example.com", &candidates, ApexMatching::Label),
            None
        );
    }

    #[test]
    fn ties_prefer_longer_candidate() {
        let candidates = ["b.ex", "b.example.com"];
        assert_eq!(
            find_apex("a.b.example.com", &candidates, ApexMatching::Substring).as_deref(),
            Some("b.example.com")
        );
    }
}

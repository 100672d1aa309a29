//! 이름 유틸리티 -- 역방향 이름, 하위 도메인 토큰 추출, 존 레벨 계산

use std::fmt::Write as _;
use std::net::IpAddr;

use regex::Regex;
use surveyor_core::scope::is_subdomain_of;
use surveyor_core::types::normalize_name;

use crate::error::DnsError;

/// 하위 도메인 하나에 해당하는 토큰 패턴
const SUBDOMAIN_PATTERN: &str =
    r"(?i)(?:(?:[a-z0-9]|[_a-z0-9][_a-z0-9-]{0,61}[a-z0-9])\.)+[a-z]{2,61}";

/// 문자열에서 도메인 이름 토큰을 추출합니다.
#[derive(Debug, Clone)]
pub struct SubdomainExtractor {
    re: Regex,
}

impl SubdomainExtractor {
    pub fn new() -> Result<Self, DnsError> {
        Ok(Self {
            re: Regex::new(SUBDOMAIN_PATTERN)?,
        })
    }

    /// 문자열 안의 모든 이름 토큰 (정규화됨)
    pub fn tokens(&self, raw: &str) -> Vec<String> {
        self.re
            .find_iter(raw)
            .map(|m| normalize_name(m.as_str()))
            .collect()
    }

    /// PTR 값 검증: 정확히 하나의 이름 토큰이 값 전체를 이룰 때만 받아들입니다.
    pub fn single_name(&self, raw: &str) -> Option<String> {
        let value = normalize_name(raw);
        let mut tokens = self.tokens(&value);
        if tokens.len() != 1 {
            return None;
        }
        let token = tokens.pop()?;
        (token == value).then_some(token)
    }
}

/// 역방향 조회 이름 (`in-addr.arpa` 또는 니블 단위 `ip6.arpa`)
pub fn reverse_name(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}.in-addr.arpa", o[3], o[2], o[1], o[0])
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(72);
            for byte in v6.octets().iter().rev() {
                let _ = write!(name, "{:x}.{:x}.", byte & 0x0f, byte >> 4);
            }
            name.push_str("ip6.arpa");
            name
        }
    }
}

/// 공개 접미사 목록 기준의 등록 도메인
pub fn registered_domain(name: &str) -> Option<String> {
    let name = normalize_name(name);
    psl::domain_str(&name).map(str::to_owned)
}

/// `name`에서 `registered`까지 모든 레이블 경계의 이름 (둘 다 포함)
///
/// `name`이 `registered` 아래가 아니면 빈 목록입니다.
pub fn zone_levels(name: &str, registered: &str) -> Vec<String> {
    let name = normalize_name(name);
    let registered = normalize_name(registered);
    if !is_subdomain_of(&name, &registered) {
        return Vec::new();
    }

    let mut levels = Vec::new();
    let mut current = name.as_str();
    loop {
        levels.push(current.to_owned());
        if current == registered {
            break;
        }
        match current.split_once('.') {
            Some((_, parent)) => current = parent,
            None => break,
        }
    }
    levels
}

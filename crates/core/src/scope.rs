//! 스코프 판정 -- 에셋이 사용자가 선언한 범위 안에 있는지 확인
//!
//! [`ScopeChecker`]는 엔진이 소비하는 인터페이스이며,
//! [`Scope`]는 `[scope]` 설정 섹션으로 만든 기본 구현입니다.

use std::collections::BTreeSet;
use std::net::IpAddr;

use crate::config::ScopeConfig;
use crate::error::ScopeError;
use crate::net::Cidr;
use crate::types::{Asset, normalize_name};

/// 스코프 일치 시 신뢰도
pub const FULL_CONFIDENCE: u8 = 100;

/// 스코프 판정 인터페이스
pub trait ScopeChecker: Send + Sync {
    /// 에셋이 스코프 안에 있으면 일치한 스코프 항목과 신뢰도를 반환합니다.
    ///
    /// `depth`가 0이면 직접 포함만 인정하고, 0보다 크면 스코프 CIDR과
    /// 겹치는 넷블록도 인정합니다.
    fn is_asset_in_scope(&self, asset: &Asset, depth: u32) -> (Option<Asset>, u8);

    /// 선언된 스코프 도메인 목록
    fn domains(&self) -> Vec<String>;

    /// 능동 탐색 모드 여부
    fn is_active(&self) -> bool;

    /// 이름이 속한 스코프 도메인 (가장 구체적인 항목)
    fn matching_domain(&self, name: &str) -> Option<String> {
        let name = normalize_name(name);
        self.domains()
            .into_iter()
            .filter(|d| is_subdomain_of(&name, d))
            .max_by_key(String::len)
    }
}

/// 이름이 `domain` 자신이거나 레이블 경계에서 끝나는 하위 도메인인지 확인합니다.
pub fn is_subdomain_of(name: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    name == domain
        || (name.len() > domain.len()
            && name.ends_with(domain)
            && name.as_bytes()[name.len() - domain.len() - 1] == b'.')
}

/// 설정 기반 스코프
#[derive(Debug, Clone, Default)]
pub struct Scope {
    domains: BTreeSet<String>,
    addresses: BTreeSet<IpAddr>,
    cidrs: Vec<Cidr>,
    asns: BTreeSet<u32>,
    blacklist: BTreeSet<String>,
    active: bool,
}

impl Scope {
    /// `[scope]` 설정에서 스코프를 생성합니다.
    pub fn from_config(config: &ScopeConfig, active: bool) -> Result<Self, ScopeError> {
        let mut scope = Self {
            active,
            asns: config.asns.iter().copied().collect(),
            ..Self::default()
        };
        for domain in &config.domains {
            scope.add_domain(domain)?;
        }
        for addr in &config.addresses {
            let ip: IpAddr = addr
                .trim()
                .parse()
                .map_err(|_| ScopeError::InvalidAddress(addr.clone()))?;
            scope.addresses.insert(ip);
        }
        for cidr in &config.cidrs {
            scope.cidrs.push(cidr.parse()?);
        }
        for name in &config.blacklist {
            scope.blacklist.insert(normalize_name(name));
        }
        Ok(scope)
    }

    /// 도메인들로 스코프를 생성합니다.
    pub fn with_domains<I, S>(domains: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scope = Self::default();
        for d in domains {
            scope.add_domain(d.as_ref())?;
        }
        Ok(scope)
    }

    pub fn add_domain(&mut self, domain: &str) -> Result<(), ScopeError> {
        let d = normalize_name(domain);
        if d.is_empty() || d.contains(char::is_whitespace) || d.starts_with('.') {
            return Err(ScopeError::InvalidDomain(domain.to_owned()));
        }
        self.domains.insert(d);
        Ok(())
    }

    pub fn add_cidr(&mut self, cidr: Cidr) {
        self.cidrs.push(cidr);
    }

    pub fn add_address(&mut self, addr: IpAddr) {
        self.addresses.insert(addr);
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|b| is_subdomain_of(name, b))
    }

    fn domain_match(&self, name: &str) -> Option<Asset> {
        let name = normalize_name(name);
        if self.blacklisted(&name) {
            return None;
        }
        self.domains
            .iter()
            .filter(|d| is_subdomain_of(&name, d))
            .max_by_key(|d| d.len())
            .map(Asset::fqdn)
    }

    fn address_match(&self, ip: &IpAddr) -> Option<Asset> {
        if self.addresses.contains(ip) {
            return Some(Asset::ip(*ip));
        }
        self.cidrs
            .iter()
            .filter(|c| c.contains(ip))
            .max_by_key(|c| c.prefix())
            .map(|c| Asset::netblock(*c))
    }
}

impl ScopeChecker for Scope {
    fn is_asset_in_scope(&self, asset: &Asset, depth: u32) -> (Option<Asset>, u8) {
        let matched = match asset {
            Asset::Fqdn(v) => self.domain_match(&v.name),
            Asset::DomainRecord(v) => self.domain_match(&v.domain),
            Asset::EmailAddress(v) => v
                .address
                .rsplit_once('@')
                .and_then(|(_, domain)| self.domain_match(domain)),
            Asset::Url(v) => url_host(&v.raw).and_then(|host| match host.parse::<IpAddr>() {
                Ok(ip) => self.address_match(&ip),
                Err(_) => self.domain_match(host),
            }),
            Asset::IpAddress(v) => self.address_match(&v.address),
            Asset::Netblock(v) => self
                .cidrs
                .iter()
                .find(|c| c.contains_cidr(&v.cidr) || (depth > 0 && c.overlaps(&v.cidr)))
                .map(|c| Asset::netblock(*c)),
            Asset::IpNetRecord(v) => self
                .cidrs
                .iter()
                .find(|c| c.contains_cidr(&v.cidr))
                .map(|c| Asset::netblock(*c)),
            Asset::AutonomousSystem(v) => self
                .asns
                .contains(&v.number)
                .then(|| asset.clone()),
            Asset::AutnumRecord(v) => self
                .asns
                .contains(&v.number)
                .then(|| Asset::AutonomousSystem(crate::types::AutonomousSystem { number: v.number })),
            _ => None,
        };
        match matched {
            Some(m) => (Some(m), FULL_CONFIDENCE),
            None => (None, 0),
        }
    }

    fn domains(&self) -> Vec<String> {
        self.domains.iter().cloned().collect()
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

fn url_host(raw: &str) -> Option<&str> {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = if let Some(stripped) = host.strip_prefix('[') {
        stripped.split(']').next()?
    } else {
        host.split(':').next()?
    };
    (!host.is_empty()).then_some(host)
}

//! DNS 질의 추상화와 hickory 기반 리졸버 풀
//!
//! 탐색 로직은 [`DnsClient`]만 사용합니다. 실제 네트워크 질의는
//! [`ResolverPool`]이 담당하며, 테스트는 스크립트된 클라이언트로 대체합니다.
//!
//! NXDOMAIN과 데이터 없음은 빈 결과이고, 전송 실패는 `Err`입니다.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::{RData, Record, RecordType as WireType};
use hickory_resolver::proto::xfer::Protocol;
use surveyor_core::config::DnsConfig;
use surveyor_core::metrics as m;
use surveyor_core::rate_limit::{RateLimitConfig, RateLimiter};
use surveyor_core::types::{RecordType, normalize_name};
use tracing::{debug, info};

use crate::error::DnsError;

/// 레코드 데이터
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// A, AAAA
    Address(IpAddr),
    /// CNAME, NS, PTR 대상 (PTR은 검증 전 원문)
    Name(String),
    Mx { preference: u16, exchange: String },
    Txt(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
}

/// 응답 레코드 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// 소유자 이름 (정규화됨)
    pub name: String,
    pub rr_type: RecordType,
    pub ttl: u32,
    pub data: RecordData,
}

impl DnsRecord {
    pub fn new(name: &str, rr_type: RecordType, ttl: u32, data: RecordData) -> Self {
        Self {
            name: normalize_name(name),
            rr_type,
            ttl,
            data,
        }
    }
}

/// DNS 질의 인터페이스
#[async_trait]
pub trait DnsClient: Send + Sync {
    async fn query(&self, name: &str, rr_type: RecordType) -> Result<Vec<DnsRecord>, DnsError>;
}

// ─── ResolverPool ────────────────────────────────────────────────────

struct PoolEntry {
    addr: SocketAddr,
    resolver: Arc<TokioResolver>,
}

/// 라운드 로빈 리졸버 풀
///
/// 풀 전체가 하나의 속도 제한기를 공유합니다.
pub struct ResolverPool {
    entries: RwLock<Vec<PoolEntry>>,
    next: AtomicUsize,
    limiter: RateLimiter,
    opts: ResolverOpts,
}

impl ResolverPool {
    /// `[dns]` 설정으로 풀을 생성합니다.
    pub fn from_config(config: &DnsConfig) -> Result<Self, DnsError> {
        let addrs = config.resolver_addrs()?;
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(config.timeout_secs.max(1));
        opts.attempts = config.attempts.max(1);

        let pool = Self {
            entries: RwLock::new(Vec::new()),
            next: AtomicUsize::new(0),
            limiter: RateLimiter::new(RateLimitConfig::per_second(config.queries_per_second)),
            opts,
        };
        pool.set_resolvers(&addrs)?;
        Ok(pool)
    }

    /// 리졸버 집합 전체를 교체합니다. 이전 목록은 남지 않습니다.
    pub fn set_resolvers(&self, addrs: &[SocketAddr]) -> Result<(), DnsError> {
        if addrs.is_empty() {
            return Err(DnsError::NoResolvers);
        }
        let mut fresh: Vec<PoolEntry> = Vec::with_capacity(addrs.len());
        for addr in addrs {
            if fresh.iter().any(|e| e.addr == *addr) {
                continue;
            }
            fresh.push(PoolEntry {
                addr: *addr,
                resolver: Arc::new(build_resolver(*addr, &self.opts)),
            });
        }

        let count = fresh.len();
        *self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fresh;
        self.next.store(0, Ordering::Relaxed);
        info!(resolvers = count, "resolver set replaced");
        Ok(())
    }

    /// 현재 사용 중인 리졸버 주소
    pub fn resolvers(&self) -> Vec<SocketAddr> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.addr)
            .collect()
    }

    fn pick(&self) -> Option<(SocketAddr, Arc<TokioResolver>)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if entries.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % entries.len();
        let entry = &entries[idx];
        Some((entry.addr, Arc::clone(&entry.resolver)))
    }
}

#[async_trait]
impl DnsClient for ResolverPool {
    async fn query(&self, name: &str, rr_type: RecordType) -> Result<Vec<DnsRecord>, DnsError> {
        let (server, resolver) = self.pick().ok_or(DnsError::NoResolvers)?;
        self.limiter.wait().await;

        let fqdn = format!("{}.", normalize_name(name));
        let result = resolver.lookup(fqdn.as_str(), wire_type(rr_type)).await;
        let label = rr_type.to_string();
        match result {
            Ok(lookup) => {
                metrics::counter!(m::DNS_QUERIES_TOTAL, m::LABEL_RECORD_TYPE => label, m::LABEL_RESULT => "ok")
                    .increment(1);
                Ok(lookup.record_iter().filter_map(convert).collect())
            }
            Err(e) if e.is_no_records_found() => {
                metrics::counter!(m::DNS_QUERIES_TOTAL, m::LABEL_RECORD_TYPE => label, m::LABEL_RESULT => "empty")
                    .increment(1);
                Ok(Vec::new())
            }
            Err(e) => {
                metrics::counter!(m::DNS_QUERIES_TOTAL, m::LABEL_RECORD_TYPE => label, m::LABEL_RESULT => "error")
                    .increment(1);
                debug!(%server, name, rr_type = %rr_type, error = %e, "query failed");
                Err(DnsError::Query {
                    name: name.to_owned(),
                    rr_type: rr_type.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for ResolverPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverPool")
            .field("resolvers", &self.resolvers())
            .field("rate_limit", &self.limiter.config())
            .finish_non_exhaustive()
    }
}

fn build_resolver(addr: SocketAddr, opts: &ResolverOpts) -> TokioResolver {
    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
    // 잘린 응답 재시도용
    config.add_name_server(NameServerConfig::new(addr, Protocol::Tcp));
    TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(opts.clone())
        .build()
}

fn wire_type(rr_type: RecordType) -> WireType {
    match rr_type {
        RecordType::A => WireType::A,
        RecordType::Ns => WireType::NS,
        RecordType::Cname => WireType::CNAME,
        RecordType::Ptr => WireType::PTR,
        RecordType::Mx => WireType::MX,
        RecordType::Txt => WireType::TXT,
        RecordType::Aaaa => WireType::AAAA,
        RecordType::Srv => WireType::SRV,
    }
}

fn convert(record: &Record) -> Option<DnsRecord> {
    let (rr_type, data) = match record.data() {
        RData::A(a) => (RecordType::A, RecordData::Address(IpAddr::V4(a.0))),
        RData::AAAA(aaaa) => (RecordType::Aaaa, RecordData::Address(IpAddr::V6(aaaa.0))),
        RData::CNAME(cname) => (RecordType::Cname, RecordData::Name(cname.0.to_utf8())),
        RData::NS(ns) => (RecordType::Ns, RecordData::Name(ns.0.to_utf8())),
        RData::PTR(ptr) => (RecordType::Ptr, RecordData::Name(ptr.0.to_utf8())),
        RData::MX(mx) => (
            RecordType::Mx,
            RecordData::Mx {
                preference: mx.preference(),
                exchange: mx.exchange().to_utf8(),
            },
        ),
        RData::TXT(txt) => (
            RecordType::Txt,
            RecordData::Txt(
                txt.iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect(),
            ),
        ),
        RData::SRV(srv) => (
            RecordType::Srv,
            RecordData::Srv {
                priority: srv.priority(),
                weight: srv.weight(),
                port: srv.port(),
                target: srv.target().to_utf8(),
            },
        ),
        _ => return None,
    };
    Some(DnsRecord::new(
        &record.name().to_utf8(),
        rr_type,
        record.ttl(),
        data,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn from_config_uses_configured_resolvers() {
        let config = DnsConfig {
            resolvers: vec!["8.8.8.8".to_owned(), "1.1.1.1:5353".to_owned()],
            ..DnsConfig::default()
        };
        let pool = ResolverPool::from_config(&config).unwrap();
        assert_eq!(
            pool.resolvers(),
            vec![addr("8.8.8.8:53"), addr("1.1.1.1:5353")]
        );
    }

    #[tokio::test]
    async fn set_resolvers_replaces_whole_set() {
        let pool = ResolverPool::from_config(&DnsConfig::default()).unwrap();
        pool.set_resolvers(&[addr("10.0.0.1:53"), addr("10.0.0.2:53")])
            .unwrap();
        pool.set_resolvers(&[addr("10.0.0.3:53")]).unwrap();
        assert_eq!(pool.resolvers(), vec![addr("10.0.0.3:53")]);
    }

    #[tokio::test]
    async fn set_resolvers_rejects_empty_list() {
        let pool = ResolverPool::from_config(&DnsConfig::default()).unwrap();
        let before = pool.resolvers();
        assert!(matches!(
            pool.set_resolvers(&[]),
            Err(DnsError::NoResolvers)
        ));
        assert_eq!(pool.resolvers(), before);
    }

    #[tokio::test]
    async fn duplicate_addresses_collapse() {
        let pool = ResolverPool::from_config(&DnsConfig::default()).unwrap();
        pool.set_resolvers(&[addr("10.0.0.1:53"), addr("10.0.0.1:53")])
            .unwrap();
        assert_eq!(pool.resolvers().len(), 1);
    }

    #[tokio::test]
    async fn round_robin_cycles() {
        let pool = ResolverPool::from_config(&DnsConfig::default()).unwrap();
        pool.set_resolvers(&[addr("10.0.0.1:53"), addr("10.0.0.2:53")])
            .unwrap();
        let first = pool.pick().unwrap().0;
        let second = pool.pick().unwrap().0;
        let third = pool.pick().unwrap().0;
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn wire_types_map() {
        assert_eq!(wire_type(RecordType::Aaaa), WireType::AAAA);
        assert_eq!(wire_type(RecordType::Srv), WireType::SRV);
    }
}

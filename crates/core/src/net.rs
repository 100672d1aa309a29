//! 네트워크 주소 유틸리티 -- CIDR 표기, 포함 관계, 예약 대역 판정
//!
//! 스코프 판정, IP 스윕, 역방향 조회가 공유하는 최소한의 주소 연산을 제공합니다.
//! 모든 연산은 IPv4는 `u32`, IPv6는 `u128` 정수 연산으로 수행합니다.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

/// CIDR 블록 (예: `192.0.2.0/24`, `2001:db8::/32`)
///
/// 생성 시 호스트 비트를 제거한 네트워크 주소로 정규화합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    /// 주소와 프리픽스 길이로 CIDR을 생성합니다.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, ScopeError> {
        let max = max_prefix(&addr);
        if prefix > max {
            return Err(ScopeError::InvalidCidr(format!("{addr}/{prefix}")));
        }
        Ok(Self {
            network: mask_addr(addr, prefix),
            prefix,
        })
    }

    /// 단일 주소를 담는 호스트 CIDR (/32 또는 /128)
    pub fn host(addr: IpAddr) -> Self {
        Self {
            network: addr,
            prefix: max_prefix(&addr),
        }
    }

    /// 네트워크 주소
    pub fn network(&self) -> IpAddr {
        self.network
    }

    /// 프리픽스 길이
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// 주소가 이 블록에 포함되는지 확인합니다.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask_addr(*addr, self.prefix) == self.network
            }
            _ => false,
        }
    }

    /// 다른 블록을 완전히 포함하는지 확인합니다.
    pub fn contains_cidr(&self, other: &Cidr) -> bool {
        self.prefix <= other.prefix && self.contains(&other.network)
    }

    /// 두 블록이 겹치는지 확인합니다.
    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.contains_cidr(other) || other.contains_cidr(self)
    }

    /// 블록의 첫 주소와 마지막 주소를 정수로 반환합니다.
    pub fn bounds(&self) -> (u128, u128) {
        let start = addr_to_u128(&self.network);
        let host_bits = u32::from(max_prefix(&self.network) - self.prefix);
        let span = if host_bits >= 128 {
            u128::MAX
        } else {
            (1u128 << host_bits) - 1
        };
        (start, start.saturating_add(span))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Cidr {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| ScopeError::InvalidCidr(s.to_owned()))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| ScopeError::InvalidCidr(s.to_owned()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| ScopeError::InvalidCidr(s.to_owned()))?;
        Self::new(addr, prefix)
    }
}

impl TryFrom<String> for Cidr {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cidr> for String {
    fn from(value: Cidr) -> Self {
        value.to_string()
    }
}

/// 주소 체계별 최대 프리픽스 길이
pub fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// 주소를 정수로 변환합니다 (IPv4는 하위 32비트 사용).
pub fn addr_to_u128(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

/// 정수를 `template`과 같은 주소 체계의 주소로 변환합니다.
pub fn u128_to_addr(value: u128, template: &IpAddr) -> IpAddr {
    match template {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(value as u32)),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

fn mask_addr(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix))
            };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = if prefix == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix))
            };
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        }
    }
}

/// 예약/사설 대역 주소인지 확인합니다.
///
/// 사설, 루프백, 링크 로컬, CGNAT, 문서용, 멀티캐스트, 미지정, ULA 대역을 포함합니다.
pub fn is_reserved(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || o[0] == 0
                || (o[0] == 100 && (o[1] & 0xc0) == 64)
                || (o[0] == 198 && (o[1] & 0xfe) == 18)
                || o[0] >= 240
        }
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (seg[0] & 0xfe00) == 0xfc00
                || (seg[0] & 0xffc0) == 0xfe80
                || (seg[0] == 0x2001 && seg[1] == 0x0db8)
        }
    }
}

//! 도메인 타입 -- 에셋 카탈로그, 관계, 속성
//!
//! 발견된 모든 객체는 고정된 에셋 카탈로그([`AssetType`])의 한 종류이며,
//! 페이로드는 닫힌 합 타입 [`Asset`]으로 표현합니다. 핸들러는 `match`로
//! 페이로드를 꺼내므로 새 변형이 추가되면 컴파일러가 누락된 분기를 알려줍니다.
//!
//! 엔티티의 정체성은 페이로드의 정규 콘텐츠 키([`Asset::key`])이며,
//! 그래프 생성 연산은 이 키에 대해 멱등입니다.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::net::Cidr;

// ─── AssetType ───────────────────────────────────────────────────────

/// 에셋 카탈로그
///
/// 변환 규칙의 From/To, 핸들러의 트리거 타입이 모두 이 카탈로그를 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetType {
    Fqdn,
    IpAddress,
    Netblock,
    AutonomousSystem,
    AutnumRecord,
    DomainRecord,
    IpNetRecord,
    Organization,
    Person,
    ContactRecord,
    Location,
    Phone,
    EmailAddress,
    Identifier,
    TlsCertificate,
    Url,
    Service,
    Account,
    Product,
    File,
}

impl AssetType {
    /// 카탈로그 전체 목록
    pub const ALL: [AssetType; 20] = [
        AssetType::Fqdn,
        AssetType::IpAddress,
        AssetType::Netblock,
        AssetType::AutonomousSystem,
        AssetType::AutnumRecord,
        AssetType::DomainRecord,
        AssetType::IpNetRecord,
        AssetType::Organization,
        AssetType::Person,
        AssetType::ContactRecord,
        AssetType::Location,
        AssetType::Phone,
        AssetType::EmailAddress,
        AssetType::Identifier,
        AssetType::TlsCertificate,
        AssetType::Url,
        AssetType::Service,
        AssetType::Account,
        AssetType::Product,
        AssetType::File,
    ];

    /// 설정 파일과 로그에서 쓰는 정규 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fqdn => "FQDN",
            Self::IpAddress => "IPAddress",
            Self::Netblock => "Netblock",
            Self::AutonomousSystem => "AutonomousSystem",
            Self::AutnumRecord => "AutnumRecord",
            Self::DomainRecord => "DomainRecord",
            Self::IpNetRecord => "IPNetRecord",
            Self::Organization => "Organization",
            Self::Person => "Person",
            Self::ContactRecord => "ContactRecord",
            Self::Location => "Location",
            Self::Phone => "Phone",
            Self::EmailAddress => "EmailAddress",
            Self::Identifier => "Identifier",
            Self::TlsCertificate => "TLSCertificate",
            Self::Url => "URL",
            Self::Service => "Service",
            Self::Account => "Account",
            Self::Product => "Product",
            Self::File => "File",
        }
    }

    /// 대소문자 구분 없이 카탈로그 이름을 조회합니다.
    pub fn lookup(name: &str) -> Option<AssetType> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| ConfigError::UnknownAssetType(s.to_owned()))
    }
}

// ─── Asset payloads ──────────────────────────────────────────────────

/// 정규화된 도메인 이름
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fqdn {
    pub name: String,
}

impl Fqdn {
    /// 소문자 변환과 끝의 점 제거로 이름을 정규화합니다.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
        }
    }
}

/// IP 주소
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: IpAddr,
}

impl IpAddress {
    /// `"IPv4"` 또는 `"IPv6"`
    pub fn family(&self) -> &'static str {
        match self.address {
            IpAddr::V4(_) => "IPv4",
            IpAddr::V6(_) => "IPv6",
        }
    }
}

/// 네트워크 블록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netblock {
    pub cidr: Cidr,
}

/// 자율 시스템 (AS 번호)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomousSystem {
    pub number: u32,
}

/// RDAP/WHOIS AS 등록 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutnumRecord {
    pub number: u32,
    pub handle: String,
    pub name: String,
}

/// 도메인 등록 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,
    pub registrar: String,
}

/// IP 대역 등록 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpNetRecord {
    pub cidr: Cidr,
    pub handle: String,
}

/// 조직
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
}

/// 인물
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub full_name: String,
}

/// 연락처 레코드 (발견된 위치 기준)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub discovered_at: String,
}

/// 물리적 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
}

/// 전화번호 (E.164)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub e164: String,
}

/// 이메일 주소
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
}

/// 외부 식별자 (LEI, DUNS 등)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub id_type: String,
    pub value: String,
}

/// TLS 인증서
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsCertificate {
    pub serial_number: String,
    pub subject_common_name: String,
}

/// URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    pub raw: String,
}

/// 네트워크 서비스 (배너/지문 식별자)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub identifier: String,
}

/// 외부 서비스 계정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub service: String,
    pub username: String,
}

/// 제품
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
}

/// 파일 (URL 기준)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub url: String,
}

// ─── Asset ───────────────────────────────────────────────────────────

/// 에셋 페이로드 -- 카탈로그의 닫힌 합 타입
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum Asset {
    Fqdn(Fqdn),
    IpAddress(IpAddress),
    Netblock(Netblock),
    AutonomousSystem(AutonomousSystem),
    AutnumRecord(AutnumRecord),
    DomainRecord(DomainRecord),
    IpNetRecord(IpNetRecord),
    Organization(Organization),
    Person(Person),
    ContactRecord(ContactRecord),
    Location(Location),
    Phone(Phone),
    EmailAddress(EmailAddress),
    Identifier(Identifier),
    TlsCertificate(TlsCertificate),
    Url(Url),
    Service(Service),
    Account(Account),
    Product(Product),
    File(File),
}

impl Asset {
    /// FQDN 에셋을 생성합니다.
    pub fn fqdn(name: impl AsRef<str>) -> Self {
        Self::Fqdn(Fqdn::new(name))
    }

    /// IP 주소 에셋을 생성합니다.
    pub fn ip(address: IpAddr) -> Self {
        Self::IpAddress(IpAddress { address })
    }

    /// 넷블록 에셋을 생성합니다.
    pub fn netblock(cidr: Cidr) -> Self {
        Self::Netblock(Netblock { cidr })
    }

    /// 카탈로그 타입
    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Fqdn(_) => AssetType::Fqdn,
            Self::IpAddress(_) => AssetType::IpAddress,
            Self::Netblock(_) => AssetType::Netblock,
            Self::AutonomousSystem(_) => AssetType::AutonomousSystem,
            Self::AutnumRecord(_) => AssetType::AutnumRecord,
            Self::DomainRecord(_) => AssetType::DomainRecord,
            Self::IpNetRecord(_) => AssetType::IpNetRecord,
            Self::Organization(_) => AssetType::Organization,
            Self::Person(_) => AssetType::Person,
            Self::ContactRecord(_) => AssetType::ContactRecord,
            Self::Location(_) => AssetType::Location,
            Self::Phone(_) => AssetType::Phone,
            Self::EmailAddress(_) => AssetType::EmailAddress,
            Self::Identifier(_) => AssetType::Identifier,
            Self::TlsCertificate(_) => AssetType::TlsCertificate,
            Self::Url(_) => AssetType::Url,
            Self::Service(_) => AssetType::Service,
            Self::Account(_) => AssetType::Account,
            Self::Product(_) => AssetType::Product,
            Self::File(_) => AssetType::File,
        }
    }

    /// 정규 콘텐츠 키
    ///
    /// 같은 객체는 항상 같은 키를 가지며, 그래프는 `(타입, 키)`로 중복을 제거합니다.
    pub fn key(&self) -> String {
        match self {
            Self::Fqdn(v) => normalize_name(&v.name),
            Self::IpAddress(v) => v.address.to_string(),
            Self::Netblock(v) => v.cidr.to_string(),
            Self::AutonomousSystem(v) => v.number.to_string(),
            Self::AutnumRecord(v) => format!("{}:{}", v.number, v.handle),
            Self::DomainRecord(v) => normalize_name(&v.domain),
            Self::IpNetRecord(v) => format!("{}:{}", v.cidr, v.handle),
            Self::Organization(v) => v.name.trim().to_lowercase(),
            Self::Person(v) => v.full_name.trim().to_lowercase(),
            Self::ContactRecord(v) => v.discovered_at.clone(),
            Self::Location(v) => v.address.trim().to_lowercase(),
            Self::Phone(v) => v.e164.clone(),
            Self::EmailAddress(v) => v.address.trim().to_lowercase(),
            Self::Identifier(v) => format!("{}:{}", v.id_type.to_lowercase(), v.value),
            Self::TlsCertificate(v) => v.serial_number.to_lowercase(),
            Self::Url(v) => v.raw.clone(),
            Self::Service(v) => v.identifier.clone(),
            Self::Account(v) => format!("{}:{}", v.service.to_lowercase(), v.username),
            Self::Product(v) => v.name.trim().to_lowercase(),
            Self::File(v) => v.url.clone(),
        }
    }

    /// FQDN 페이로드를 꺼냅니다.
    pub fn as_fqdn(&self) -> Option<&Fqdn> {
        match self {
            Self::Fqdn(v) => Some(v),
            _ => None,
        }
    }

    /// IP 주소 페이로드를 꺼냅니다.
    pub fn as_ip(&self) -> Option<&IpAddress> {
        match self {
            Self::IpAddress(v) => Some(v),
            _ => None,
        }
    }

    /// 넷블록 페이로드를 꺼냅니다.
    pub fn as_netblock(&self) -> Option<&Netblock> {
        match self {
            Self::Netblock(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset_type(), self.key())
    }
}

/// 도메인 이름 정규화: 공백 제거, 소문자, 끝의 점 제거
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

// ─── DNS record type ─────────────────────────────────────────────────

/// 엔진이 다루는 DNS 레코드 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    Ns,
    Cname,
    Ptr,
    Mx,
    Txt,
    Aaaa,
    Srv,
}

impl RecordType {
    /// RFC 1035/3596/2782 레코드 타입 코드
    pub fn code(&self) -> u16 {
        match self {
            Self::A => 1,
            Self::Ns => 2,
            Self::Cname => 5,
            Self::Ptr => 12,
            Self::Mx => 15,
            Self::Txt => 16,
            Self::Aaaa => 28,
            Self::Srv => 33,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::Ns => "NS",
            Self::Cname => "CNAME",
            Self::Ptr => "PTR",
            Self::Mx => "MX",
            Self::Txt => "TXT",
            Self::Aaaa => "AAAA",
            Self::Srv => "SRV",
        };
        f.write_str(s)
    }
}

/// 리소스 레코드 헤더 (타입, 클래스, TTL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrHeader {
    pub rr_type: RecordType,
    /// 클래스 (IN = 1)
    pub class: u16,
    pub ttl: u32,
}

impl RrHeader {
    /// IN 클래스 헤더를 생성합니다.
    pub fn new(rr_type: RecordType, ttl: u32) -> Self {
        Self {
            rr_type,
            class: 1,
            ttl,
        }
    }
}

// ─── Relation ────────────────────────────────────────────────────────

/// 관계 이름: DNS 레코드
pub const REL_DNS_RECORD: &str = "dns_record";
/// 관계 이름: 존 내부 노드 (apex -> 하위 이름)
pub const REL_NODE: &str = "node";
/// 관계 이름: 포함 (넷블록 -> IP)
pub const REL_CONTAINS: &str = "contains";

/// 방향성 있는 타입 관계
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Relation {
    /// 추가 구조가 없는 관계 (`node`, `contains` 등)
    Simple { name: String },
    /// 기본 DNS 레코드 관계 (A, AAAA, CNAME, NS, PTR)
    BasicDns { name: String, header: RrHeader },
    /// 우선순위를 가진 DNS 레코드 관계 (MX)
    PrefDns {
        name: String,
        header: RrHeader,
        preference: u16,
    },
    /// SRV 레코드 관계
    SrvDns {
        name: String,
        header: RrHeader,
        priority: u16,
        weight: u16,
        port: u16,
    },
}

impl Relation {
    /// 단순 관계를 생성합니다.
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple { name: name.into() }
    }

    /// 기본 DNS 레코드 관계를 생성합니다.
    pub fn dns(rr_type: RecordType, ttl: u32) -> Self {
        Self::BasicDns {
            name: REL_DNS_RECORD.to_owned(),
            header: RrHeader::new(rr_type, ttl),
        }
    }

    /// 관계 이름 (조회 필터에 사용)
    pub fn name(&self) -> &str {
        match self {
            Self::Simple { name }
            | Self::BasicDns { name, .. }
            | Self::PrefDns { name, .. }
            | Self::SrvDns { name, .. } => name,
        }
    }

    /// DNS 관계라면 레코드 타입을 반환합니다.
    pub fn rr_type(&self) -> Option<RecordType> {
        match self {
            Self::Simple { .. } => None,
            Self::BasicDns { header, .. }
            | Self::PrefDns { header, .. }
            | Self::SrvDns { header, .. } => Some(header.rr_type),
        }
    }

    /// 멱등성 판정용 키 (TTL 등 가변 값은 제외)
    pub fn key(&self) -> String {
        match self.rr_type() {
            Some(rr) => format!("{}:{}", self.name(), rr.code()),
            None => self.name().to_owned(),
        }
    }
}

// ─── Property ────────────────────────────────────────────────────────

/// 속성 이름: 출처
pub const PROP_SOURCE: &str = "source";
/// 속성 이름: 마지막 모니터링 시각 (TTL 워터마크)
pub const PROP_LAST_MONITORED: &str = "last_monitored";

/// 이름과 고정 신뢰도를 가진 외부 출처
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    /// 0-100
    pub confidence: u8,
}

impl Source {
    /// 신뢰도를 100으로 제한하여 출처를 생성합니다.
    pub fn new(name: impl Into<String>, confidence: u8) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.min(100),
        }
    }
}

/// 출처 속성 페이로드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProperty {
    pub source: String,
    pub confidence: u8,
}

impl From<&Source> for SourceProperty {
    fn from(src: &Source) -> Self {
        Self {
            source: src.name.clone(),
            confidence: src.confidence,
        }
    }
}

/// 엔티티 또는 엣지에 붙는 주석
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Property {
    /// 발견 출처 (provenance)
    Source(SourceProperty),
    /// 출처에 능동 조회를 수행한 시점의 워터마크
    Monitored(SourceProperty),
    /// 엣지로 표현하지 않는 DNS 레코드 (TXT 등)
    DnsRecord {
        header: RrHeader,
        data: String,
    },
    /// 이름-값 쌍
    Simple { name: String, value: String },
}

impl Property {
    /// 속성 이름 (조회 필터에 사용)
    pub fn name(&self) -> &str {
        match self {
            Self::Source(_) => PROP_SOURCE,
            Self::Monitored(_) => PROP_LAST_MONITORED,
            Self::DnsRecord { .. } => REL_DNS_RECORD,
            Self::Simple { name, .. } => name,
        }
    }

    /// 멱등성 판정용 키
    pub fn key(&self) -> String {
        match self {
            Self::Source(p) => format!("{PROP_SOURCE}:{}", p.source),
            Self::Monitored(p) => format!("{PROP_LAST_MONITORED}:{}", p.source),
            Self::DnsRecord { header, data } => {
                format!("{REL_DNS_RECORD}:{}:{data}", header.rr_type.code())
            }
            Self::Simple { name, value } => format!("{name}:{value}"),
        }
    }

    /// 출처 속성이면 출처 이름을 반환합니다.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Self::Source(p) | Self::Monitored(p) => Some(&p.source),
            _ => None,
        }
    }
}

// ─── Stored objects ──────────────────────────────────────────────────

/// 그래프에 저장된 엔티티
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub asset: Asset,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// 그래프에 저장할 엣지 요청
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRequest {
    pub relation: Relation,
    pub from_id: String,
    pub to_id: String,
}

impl EdgeRequest {
    /// 두 엔티티 사이의 엣지 요청을 생성합니다.
    pub fn new(relation: Relation, from: &Entity, to: &Entity) -> Self {
        Self {
            relation,
            from_id: from.id.clone(),
            to_id: to.id.clone(),
        }
    }
}

/// 그래프에 저장된 엣지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub relation: Relation,
    pub from_id: String,
    pub to_id: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// 엔티티에 붙은 속성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProperty {
    pub id: String,
    pub entity_id: String,
    pub property: Property,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// 엣지에 붙은 속성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeProperty {
    pub id: String,
    pub edge_id: String,
    pub property: Property,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_type_lookup_is_case_insensitive() {
        assert_eq!(AssetType::lookup("fqdn"), Some(AssetType::Fqdn));
        assert_eq!(AssetType::lookup("IPADDRESS"), Some(AssetType::IpAddress));
        assert_eq!(AssetType::lookup("tlscertificate"), Some(AssetType::TlsCertificate));
        assert_eq!(AssetType::lookup("widget"), None);
    }

    #[test]
    fn asset_type_names_roundtrip() {
        for t in AssetType::ALL {
            assert_eq!(t.as_str().parse::<AssetType>().unwrap(), t);
        }
    }

    #[test]
    fn fqdn_key_is_normalized() {
        let a = Asset::fqdn("WWW.Example.COM.");
        let b = Asset::fqdn("www.example.com");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "www.example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn asset_type_matches_variant() {
        let ip = Asset::ip("1.2.3.4".parse().unwrap());
        assert_eq!(ip.asset_type(), AssetType::IpAddress);
        assert_eq!(ip.key(), "1.2.3.4");
        assert!(ip.as_fqdn().is_none());
        assert_eq!(ip.as_ip().map(|v| v.family()), Some("IPv4"));
    }

    #[test]
    fn relation_key_ignores_ttl() {
        let a = Relation::dns(RecordType::A, 300);
        let b = Relation::dns(RecordType::A, 60);
        let c = Relation::dns(RecordType::Aaaa, 300);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert_eq!(a.name(), REL_DNS_RECORD);
    }

    #[test]
    fn property_names() {
        let src = Source::new("DNS", 150);
        assert_eq!(src.confidence, 100);
        let tag = Property::Source(SourceProperty::from(&src));
        let mon = Property::Monitored(SourceProperty::from(&src));
        assert_eq!(tag.name(), PROP_SOURCE);
        assert_eq!(mon.name(), PROP_LAST_MONITORED);
        assert_ne!(tag.key(), mon.key());
        assert_eq!(mon.source_name(), Some("DNS"));
    }

    #[test]
    fn asset_serializes_with_type_tag() {
        let asset = Asset::fqdn("example.com");
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["type"], "Fqdn");
        assert_eq!(json["content"]["name"], "example.com");
    }
}

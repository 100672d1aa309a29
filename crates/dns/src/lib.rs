//! Surveyor DNS 탐색 엔진
//!
//! 새로 발견된 FQDN과 IP 주소를 DNS로 확장합니다.
//!
//! # 구성
//! - [`resolver`]: [`DnsClient`] 추상화와 hickory 기반 [`ResolverPool`]
//! - `address`: A/AAAA 해석, 이후 IP 스윕과 존 워크
//! - `cname`: 별칭 추적
//! - `reverse`: PTR 조회와 값 검증
//! - `txt`: TXT 레코드 속성 기록
//! - [`zone`]: 등록 도메인까지의 NS/MX/SRV 워크
//! - [`apex`]: 존 경계 판정
//! - [`sweep`]: 이웃 주소 스윕
//! - [`DnsPlugin`]: 위 핸들러들을 디스패처에 등록

mod address;
pub mod apex;
mod cname;
pub mod context;
pub mod error;
pub mod names;
pub mod plugin;
pub mod resolver;
mod reverse;
pub mod srv;
pub mod sweep;
mod txt;
pub mod zone;

pub use apex::find_apex;
pub use error::{DNS_SOURCE, DnsError};
pub use names::{SubdomainExtractor, registered_domain, reverse_name, zone_levels};
pub use plugin::DnsPlugin;
pub use resolver::{DnsClient, DnsRecord, RecordData, ResolverPool};
pub use sweep::{FIRST_SWEEP_SIZE, MAX_SWEEP_SIZE, SECOND_SWEEP_SIZE, sweep_size};

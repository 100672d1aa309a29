//! 설정 관리 -- surveyor.toml 파싱 및 런타임 설정
//!
//! [`SurveyorConfig`]는 엔진, 스코프, DNS, 데이터 소스, 변환 규칙 설정을 담는
//! 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SURVEYOR_DNS_QUERIES_PER_SECOND=50` 형식)
//! 3. 설정 파일 (`surveyor.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), surveyor_core::error::SurveyorError> {
//! use surveyor_core::config::SurveyorConfig;
//!
//! let config = SurveyorConfig::load("surveyor.toml").await?;
//! let matches = config
//!     .transformation_set()?
//!     .check("FQDN", &["IPAddress"]);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SurveyorError};
use crate::net::Cidr;
use crate::rate_limit::RateLimitConfig;
use crate::transform::{
    DEFAULT_CONFIDENCE, DEFAULT_TTL_MINUTES, Transformation, TransformationSet,
};

/// DNS 기본 포트
pub const DNS_PORT: u16 = 53;

/// Surveyor 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 이름별 외부 데이터 소스 설정
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSourceConfig>,
    /// 선언 순서가 유지되는 변환 규칙
    #[serde(default)]
    pub transformations: Vec<Transformation>,
}

impl SurveyorConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용한 뒤 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SurveyorError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SurveyorError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SurveyorError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SurveyorError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SurveyorError> {
        toml::from_str(toml_str).map_err(|e| {
            SurveyorError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SURVEYOR_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SURVEYOR_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SURVEYOR_GENERAL_LOG_FORMAT");

        // Engine
        override_parsed(&mut self.engine.active, "SURVEYOR_ENGINE_ACTIVE");
        override_parsed(&mut self.engine.max_workers, "SURVEYOR_ENGINE_MAX_WORKERS");
        override_parsed(
            &mut self.engine.default_ttl_minutes,
            "SURVEYOR_ENGINE_DEFAULT_TTL_MINUTES",
        );
        override_parsed(
            &mut self.engine.default_confidence,
            "SURVEYOR_ENGINE_DEFAULT_CONFIDENCE",
        );
        override_parsed(
            &mut self.engine.apex_matching,
            "SURVEYOR_ENGINE_APEX_MATCHING",
        );

        // Scope
        override_csv(&mut self.scope.domains, "SURVEYOR_SCOPE_DOMAINS");
        override_csv(&mut self.scope.addresses, "SURVEYOR_SCOPE_ADDRESSES");
        override_csv(&mut self.scope.cidrs, "SURVEYOR_SCOPE_CIDRS");
        override_csv(&mut self.scope.blacklist, "SURVEYOR_SCOPE_BLACKLIST");

        // DNS
        override_csv(&mut self.dns.resolvers, "SURVEYOR_DNS_RESOLVERS");
        override_parsed(
            &mut self.dns.queries_per_second,
            "SURVEYOR_DNS_QUERIES_PER_SECOND",
        );
        override_parsed(&mut self.dns.timeout_secs, "SURVEYOR_DNS_TIMEOUT_SECS");
        override_parsed(&mut self.dns.attempts, "SURVEYOR_DNS_ATTEMPTS");

        // Metrics
        override_parsed(&mut self.metrics.enabled, "SURVEYOR_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SURVEYOR_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "SURVEYOR_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "SURVEYOR_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 변환 규칙은 [`TransformationSet::add`]를 통해 하나씩 검증됩니다.
    pub fn validate(&self) -> Result<(), SurveyorError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.engine.max_workers == 0 {
            return Err(invalid("engine.max_workers", "must be greater than 0"));
        }
        if self.engine.default_ttl_minutes == 0 {
            return Err(invalid(
                "engine.default_ttl_minutes",
                "must be greater than 0",
            ));
        }
        if self.engine.default_confidence == 0 || self.engine.default_confidence > 100 {
            return Err(invalid("engine.default_confidence", "must be within 1-100"));
        }

        for cidr in &self.scope.cidrs {
            cidr.parse::<Cidr>()
                .map_err(|e| invalid("scope.cidrs", e.to_string()))?;
        }
        for addr in &self.scope.addresses {
            addr.trim()
                .parse::<IpAddr>()
                .map_err(|_| invalid("scope.addresses", format!("invalid address '{addr}'")))?;
        }
        if let Some(bad) = self
            .scope
            .domains
            .iter()
            .find(|d| d.trim().is_empty() || d.contains(char::is_whitespace))
        {
            return Err(invalid("scope.domains", format!("invalid domain '{bad}'")));
        }

        if self.dns.resolvers.is_empty() {
            return Err(invalid("dns.resolvers", "at least one resolver is required"));
        }
        self.dns.resolver_addrs()?;
        if self.dns.queries_per_second == 0 {
            return Err(invalid("dns.queries_per_second", "must be greater than 0"));
        }
        if self.dns.timeout_secs == 0 {
            return Err(invalid("dns.timeout_secs", "must be greater than 0"));
        }
        if self.dns.attempts == 0 {
            return Err(invalid("dns.attempts", "must be greater than 0"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }

        for (name, ds) in &self.data_sources {
            let field = format!("data_sources.{name}");
            if ds.confidence > 100 {
                return Err(invalid(&format!("{field}.confidence"), "must be within 0-100"));
            }
            ds.rate_limit.validate(&format!("{field}.rate_limit"))?;
        }

        self.transformation_set()?;
        Ok(())
    }

    /// 데이터 소스를 등록하고 모든 변환 규칙을 검증하여 매처를 만듭니다.
    pub fn transformation_set(&self) -> Result<TransformationSet, ConfigError> {
        let mut set = TransformationSet::new(
            self.engine.default_ttl_minutes,
            self.engine.default_confidence,
        );
        for (name, ds) in &self.data_sources {
            set.register_source(name, ds.ttl);
        }
        for rule in &self.transformations {
            set.add(rule.clone())?;
        }
        Ok(set)
    }

    /// 이름으로 데이터 소스 설정을 조회합니다 (대소문자 무시).
    pub fn data_source(&self, name: &str) -> Option<&DataSourceConfig> {
        self.data_sources
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SurveyorError {
    SurveyorError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    })
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Apex 후보 매칭 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApexMatching {
    /// 가장 작은 0이 아닌 부분 문자열 오프셋
    #[default]
    Substring,
    /// 레이블 경계에서 시작하여 이름 끝까지 이어지는 접미사만 허용
    Label,
}

impl fmt::Display for ApexMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring => f.write_str("substring"),
            Self::Label => f.write_str("label"),
        }
    }
}

impl FromStr for ApexMatching {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(Self::Substring),
            "label" => Ok(Self::Label),
            other => Err(ConfigError::InvalidValue {
                field: "engine.apex_matching".to_owned(),
                reason: format!("unknown mode '{other}', expected substring or label"),
            }),
        }
    }
}

/// 디스패치 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 능동 탐색 (최대 스윕 크기 사용)
    pub active: bool,
    /// 동시에 실행 가능한 핸들러 콜백 수
    pub max_workers: usize,
    /// 전역 기본 TTL (분)
    pub default_ttl_minutes: u32,
    /// 전역 기본 신뢰도
    pub default_confidence: u8,
    pub apex_matching: ApexMatching,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active: false,
            max_workers: 256,
            default_ttl_minutes: DEFAULT_TTL_MINUTES,
            default_confidence: DEFAULT_CONFIDENCE,
            apex_matching: ApexMatching::Substring,
        }
    }
}

/// 스코프 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub domains: Vec<String>,
    pub addresses: Vec<String>,
    pub cidrs: Vec<String>,
    pub asns: Vec<u32>,
    /// 스코프에서 항상 제외되는 이름 (하위 도메인 포함)
    pub blacklist: Vec<String>,
}

/// DNS 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// `ip` 또는 `ip:port` 형식의 리졸버 목록
    pub resolvers: Vec<String>,
    /// 리졸버 풀 전체의 초당 질의 수
    pub queries_per_second: u32,
    /// 질의 타임아웃 (초)
    pub timeout_secs: u64,
    /// 질의 시도 횟수
    pub attempts: usize,
    /// DNS 발견의 출처 신뢰도
    pub confidence: u8,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            resolvers: vec![
                "8.8.8.8".to_owned(),
                "1.1.1.1".to_owned(),
                "9.9.9.9".to_owned(),
            ],
            queries_per_second: 100,
            timeout_secs: 5,
            attempts: 2,
            confidence: 100,
        }
    }
}

impl DnsConfig {
    /// 리졸버 목록을 소켓 주소로 변환합니다. 포트가 없으면 53을 사용합니다.
    pub fn resolver_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.resolvers.iter().map(|r| parse_resolver(r)).collect()
    }
}

/// `ip`, `ip:port`, `[v6]:port` 형식의 리졸버 주소를 파싱합니다.
pub fn parse_resolver(raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Ok(addr);
    }
    raw.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ConfigError::InvalidValue {
            field: "dns.resolvers".to_owned(),
            reason: format!("invalid resolver address '{raw}'"),
        })
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 외부 데이터 소스 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// 이 소스의 결과를 재사용하는 기간 (분, 0이면 변환 규칙을 따름)
    pub ttl: u32,
    /// 출처 신뢰도 (0이면 변환 규칙을 따름)
    pub confidence: u8,
    pub rate_limit: RateLimitConfig,
    /// 인증 정보 (형식은 각 소스가 해석)
    pub credentials: BTreeMap<String, String>,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = std::any::type_name::<T>(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = SurveyorConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(!config.engine.active);
        assert_eq!(config.engine.default_ttl_minutes, 1440);
        assert_eq!(config.engine.apex_matching, ApexMatching::Substring);
        assert_eq!(config.dns.resolvers.len(), 3);
        assert!(config.transformations.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        SurveyorConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = SurveyorConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.dns.queries_per_second, 100);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"

[engine]
active = true
max_workers = 64
apex_matching = "label"

[scope]
domains = ["example.com"]
cidrs = ["192.0.2.0/24"]
asns = [64500]

[dns]
resolvers = ["127.0.0.1:5353", "9.9.9.9"]
queries_per_second = 20

[data_sources.Shodan]
ttl = 4320
confidence = 80
credentials = { apikey = "secret" }

[data_sources.Shodan.rate_limit]
interval_ms = 1000
burst = 1

[[transformations]]
from = "FQDN"
to = "IPAddress"
ttl = 1440

[[transformations]]
from = "FQDN"
to = "all"
exclude = ["TLSCertificate"]

[[transformations]]
from = "IPAddress"
to = "Shodan"
"#;
        let config = SurveyorConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert!(config.engine.active);
        assert_eq!(config.engine.apex_matching, ApexMatching::Label);
        assert_eq!(config.scope.asns, vec![64500]);
        assert_eq!(config.transformations.len(), 3);
        assert_eq!(config.transformations[1].exclude, vec!["TLSCertificate"]);

        let shodan = config.data_source("shodan").unwrap();
        assert_eq!(shodan.ttl, 4320);
        assert_eq!(shodan.credentials.get("apikey").unwrap(), "secret");

        let addrs = config.dns.resolver_addrs().unwrap();
        assert_eq!(addrs[0].port(), 5353);
        assert_eq!(addrs[1].port(), DNS_PORT);

        let set = config.transformation_set().unwrap();
        let m = set.check("IPAddress", &["Shodan"]).unwrap();
        assert_eq!(m.ttl("Shodan"), Some(4320));
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = SurveyorConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            SurveyorError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = SurveyorConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = SurveyorConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_bad_scope_cidr() {
        let mut config = SurveyorConfig::default();
        config.scope.cidrs = vec!["10.0.0.0/99".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scope.cidrs"));
    }

    #[test]
    fn validate_rejects_bad_resolver() {
        let mut config = SurveyorConfig::default();
        config.dns.resolvers = vec!["resolver.example".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dns.resolvers"));
    }

    #[test]
    fn validate_rejects_none_alongside_concrete_rule() {
        let mut config = SurveyorConfig::default();
        config.transformations = vec![
            Transformation::new("FQDN", "none"),
            Transformation::new("FQDN", "IPAddress"),
        ];
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            SurveyorError::Config(ConfigError::InvalidTransformation { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_from_type() {
        let mut config = SurveyorConfig::default();
        config.transformations = vec![Transformation::new("Gadget", "FQDN")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn apex_matching_parse() {
        assert_eq!("LABEL".parse::<ApexMatching>().unwrap(), ApexMatching::Label);
        assert!("suffix".parse::<ApexMatching>().is_err());
        assert_eq!(ApexMatching::Substring.to_string(), "substring");
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe {
            std::env::set_var("SURVEYOR_ENGINE_ACTIVE", "true");
            std::env::set_var("SURVEYOR_DNS_RESOLVERS", "10.0.0.53, 10.0.0.54:5353");
            std::env::set_var("SURVEYOR_ENGINE_APEX_MATCHING", "label");
        }
        let mut config = SurveyorConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("SURVEYOR_ENGINE_ACTIVE");
            std::env::remove_var("SURVEYOR_DNS_RESOLVERS");
            std::env::remove_var("SURVEYOR_ENGINE_APEX_MATCHING");
        }
        assert!(config.engine.active);
        assert_eq!(config.dns.resolvers, vec!["10.0.0.53", "10.0.0.54:5353"]);
        assert_eq!(config.engine.apex_matching, ApexMatching::Label);
    }

    #[test]
    #[serial]
    fn env_override_invalid_keeps_original() {
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("SURVEYOR_DNS_ATTEMPTS", "many") };
        let mut config = SurveyorConfig::default();
        config.apply_env_overrides();
        unsafe { std::env::remove_var("SURVEYOR_DNS_ATTEMPTS") };
        assert_eq!(config.dns.attempts, 2);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let mut config = SurveyorConfig::default();
        config.scope.domains = vec!["example.com".to_owned()];
        config
            .transformations
            .push(Transformation::new("FQDN", "all").with_exclude(["URL"]));
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = SurveyorConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.scope.domains, config.scope.domains);
        assert_eq!(parsed.transformations, config.transformations);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = SurveyorConfig::from_file("/nonexistent/path/surveyor.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SurveyorError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}

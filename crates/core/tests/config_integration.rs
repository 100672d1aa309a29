//! surveyor.toml 통합 설정 테스트
//!
//! - surveyor.toml.example 파싱 및 검증
//! - 부분 설정 로딩
//! - 환경변수 우선순위
//! - 잘못된 변환 규칙 에러

use std::io::Write;

use serial_test::serial;
use surveyor_core::config::{ApexMatching, SurveyorConfig};
use surveyor_core::error::{ConfigError, SurveyorError};

const EXAMPLE: &str = include_str!("../../../surveyor.toml.example");

// =============================================================================
// surveyor.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = SurveyorConfig::parse(EXAMPLE).expect("example config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.scope.domains, vec!["example.com"]);
}

#[test]
fn example_config_passes_validation() {
    let config = SurveyorConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_engine_defaults() {
    let config = SurveyorConfig::parse(EXAMPLE).expect("should parse");
    assert!(!config.engine.active);
    assert_eq!(config.engine.max_workers, 256);
    assert_eq!(config.engine.default_ttl_minutes, 1440);
    assert_eq!(config.engine.apex_matching, ApexMatching::Substring);
}

#[test]
fn example_config_transformations_keep_order() {
    let config = SurveyorConfig::parse(EXAMPLE).expect("should parse");
    let pairs: Vec<(&str, &str)> = config
        .transformations
        .iter()
        .map(|t| (t.from.as_str(), t.to.as_str()))
        .collect();
    assert_eq!(pairs[0], ("FQDN", "DNS"));
    assert_eq!(pairs[2], ("FQDN", "all"));
    assert_eq!(pairs.len(), 6);
}

#[test]
fn example_config_matches_expected_targets() {
    let config = SurveyorConfig::parse(EXAMPLE).expect("should parse");
    let set = config.transformation_set().expect("rules should validate");
    let m = set
        .check("FQDN", &["IPAddress", "TLSCertificate", "DNS"])
        .expect("fqdn rules should match");
    assert!(m.is_match("IPAddress"));
    assert!(m.is_match("DNS"));
    assert!(!m.is_match("TLSCertificate"));
    assert_eq!(m.ttl("DNS"), Some(1440));
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn load_partial_file_merges_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[scope]\ndomains = [\"example.org\"]\n\n[dns]\nqueries_per_second = 5"
    )
    .expect("write");

    let config = SurveyorConfig::from_file(file.path())
        .await
        .expect("should load");
    assert_eq!(config.scope.domains, vec!["example.org"]);
    assert_eq!(config.dns.queries_per_second, 5);
    assert_eq!(config.dns.attempts, 2);
    assert_eq!(config.general.log_level, "info");
}

#[tokio::test]
async fn load_rejects_none_rule_declared_after_concrete_rule() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
[[transformations]]
from = "IPAddress"
to = "FQDN"

[[transformations]]
from = "IPAddress"
to = "none"
"#
    )
    .expect("write");

    let err = SurveyorConfig::load(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        SurveyorError::Config(ConfigError::InvalidTransformation { .. })
    ));
}

#[tokio::test]
async fn load_rejects_garbage() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "this is = = not toml").expect("write");
    let err = SurveyorConfig::load(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        SurveyorError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[tokio::test]
#[serial]
async fn env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[general]\nlog_level = \"warn\"").expect("write");

    // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
    unsafe { std::env::set_var("SURVEYOR_GENERAL_LOG_LEVEL", "debug") };
    let result = SurveyorConfig::load(file.path()).await;
    unsafe { std::env::remove_var("SURVEYOR_GENERAL_LOG_LEVEL") };

    let config = result.expect("should load");
    assert_eq!(config.general.log_level, "debug");
}

#[tokio::test]
#[serial]
async fn invalid_env_value_fails_validation() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[general]\nlog_level = \"info\"").expect("write");

    // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
    unsafe { std::env::set_var("SURVEYOR_GENERAL_LOG_FORMAT", "xml") };
    let result = SurveyorConfig::load(file.path()).await;
    unsafe { std::env::remove_var("SURVEYOR_GENERAL_LOG_FORMAT") };

    let err = result.unwrap_err();
    assert!(err.to_string().contains("log_format"));
}

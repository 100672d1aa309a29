//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> plugin registration -> seeding -> quiescence -> shutdown,
//! with a scripted DNS client in place of real resolvers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use surveyor_core::config::SurveyorConfig;
use surveyor_core::graph::AssetGraph;
use surveyor_core::types::{AssetType, RecordType};
use surveyor_daemon::orchestrator::Orchestrator;
use surveyor_dns::{DnsClient, DnsError, DnsPlugin, DnsRecord, RecordData};
use surveyor_engine::{PluginRegistry, PluginState};

/// Answers only the A queries it was given; everything else is empty.
#[derive(Default)]
struct StaticClient {
    addresses: Mutex<HashMap<String, RecordData>>,
}

impl StaticClient {
    fn with_address(name: &str, ip: &str) -> Self {
        let client = Self::default();
        client.addresses.lock().unwrap().insert(
            name.to_owned(),
            RecordData::Address(ip.parse().expect("valid ip")),
        );
        client
    }
}

#[async_trait]
impl DnsClient for StaticClient {
    async fn query(&self, name: &str, rr_type: RecordType) -> Result<Vec<DnsRecord>, DnsError> {
        if rr_type != RecordType::A {
            return Ok(Vec::new());
        }
        Ok(self
            .addresses
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .map(|data| vec![DnsRecord::new(name, rr_type, 300, data)])
            .unwrap_or_default())
    }
}

fn discovery_config(domains: &[&str]) -> SurveyorConfig {
    let mut config = SurveyorConfig::parse(
        r#"
[general]
log_level = "info"

[engine]
max_workers = 16

[[transformations]]
from = "FQDN"
to = "IPAddress"

[[transformations]]
from = "FQDN"
to = "FQDN"

[[transformations]]
from = "IPAddress"
to = "FQDN"
"#,
    )
    .expect("failed to parse discovery config");
    config.scope.domains = domains.iter().map(|d| (*d).to_owned()).collect();
    config
}

fn scripted_plugins(client: StaticClient) -> PluginRegistry {
    let mut plugins = PluginRegistry::new();
    let dns = DnsPlugin::new(Arc::new(client)).expect("plugin should build");
    plugins.register(Box::new(dns)).expect("plugin should register");
    plugins
}

#[tokio::test]
async fn test_build_from_config_registers_dns_plugin() {
    // Given: A valid config with default resolvers
    let config = discovery_config(&["example.com"]);

    // When: Building the orchestrator
    let orchestrator = Orchestrator::build_from_config(config).expect("orchestrator should build");

    // Then: The DNS plugin is registered but not yet started
    assert_eq!(orchestrator.plugins().count(), 1);
    let dns = orchestrator.plugins().get("DNS").expect("DNS plugin registered");
    assert_eq!(dns.state(), PluginState::Created);
}

#[tokio::test]
async fn test_build_rejects_invalid_scope() {
    // Given: A malformed CIDR in scope
    let mut config = discovery_config(&[]);
    config.scope.cidrs = vec!["10.0.0.0/99".to_owned()];

    // When / Then: Build fails before anything starts
    assert!(Orchestrator::build_from_config(config).is_err());
}

#[tokio::test]
async fn test_run_quiesces_and_reports_summary() {
    // Given: A scope domain that resolves to one address
    let config = discovery_config(&["example.com"]);
    let client = StaticClient::with_address("example.com", "93.184.216.34");
    let mut orchestrator = Orchestrator::with_plugins(config, scripted_plugins(client))
        .expect("orchestrator should build");

    // When: Running without any shutdown signal
    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        orchestrator.run_until(std::future::pending()),
    )
    .await
    .expect("run should quiesce")
    .expect("run should succeed");

    // Then: Discovery stopped on its own after resolving and sweeping
    assert!(!summary.interrupted);
    assert_eq!(summary.seeds, 1);
    assert_eq!(summary.session.handler_errors, 0);
    let ips = orchestrator
        .graph()
        .find_entities_by_type(AssetType::IpAddress, None)
        .await
        .expect("graph query");
    assert_eq!(ips.len(), 1 + surveyor_dns::FIRST_SWEEP_SIZE);
    assert!(summary.graph.entities > ips.len());

    // Then: Plugins were stopped in the teardown
    let states = orchestrator.plugins().states();
    assert_eq!(states, vec![("DNS".to_owned(), PluginState::Stopped)]);
}

#[tokio::test]
async fn test_run_without_seeds_finishes_immediately() {
    // Given: No scope domains at all
    let config = discovery_config(&[]);
    let mut orchestrator = Orchestrator::with_plugins(config, scripted_plugins(StaticClient::default()))
        .expect("orchestrator should build");

    // When: Running
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run_until(std::future::pending()),
    )
    .await
    .expect("run should finish")
    .expect("run should succeed");

    // Then: Nothing was seeded or discovered
    assert_eq!(summary.seeds, 0);
    assert_eq!(summary.graph.entities, 0);
    assert_eq!(summary.session.events_dispatched, 0);
}

#[tokio::test]
async fn test_shutdown_signal_interrupts_run() {
    // Given: Seeds that would keep the session busy
    let config = discovery_config(&["example.com", "example.org"]);
    let client = StaticClient::with_address("example.com", "93.184.216.34");
    let mut orchestrator = Orchestrator::with_plugins(config, scripted_plugins(client))
        .expect("orchestrator should build");

    // When: The shutdown future is already complete
    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        orchestrator.run_until(std::future::ready("test")),
    )
    .await
    .expect("run should stop")
    .expect("run should succeed");

    // Then: The run reports the interruption and still tears down cleanly
    assert!(summary.interrupted);
    assert_eq!(summary.seeds, 2);
    let states = orchestrator.plugins().states();
    assert_eq!(states[0].1, PluginState::Stopped);
}

#[tokio::test]
async fn test_duplicate_plugin_registration_rejected() {
    // Given: A registry that already holds a DNS plugin
    let mut plugins = scripted_plugins(StaticClient::default());

    // When: Registering a second plugin with the same name
    let second = DnsPlugin::new(Arc::new(StaticClient::default())).expect("plugin should build");
    let result = plugins.register(Box::new(second));

    // Then: Registration fails
    assert!(result.is_err());
    assert_eq!(plugins.count(), 1);
}

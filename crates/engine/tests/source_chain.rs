//! 통합 테스트 -- 여러 소스 플러그인이 디스패치로 연쇄되는 흐름을 검증합니다.
//!
//! FQDN → IPAddress → Netblock 두 단계 소스와, 항상 실패하는 소스를 함께
//! 등록해 에러 격리와 정지 상태 감지를 확인합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use surveyor_core::config::SurveyorConfig;
use surveyor_core::graph::{AssetGraph, MemoryGraph};
use surveyor_core::net::Cidr;
use surveyor_core::scope::Scope;
use surveyor_core::transform::Transformation;
use surveyor_core::types::{Asset, AssetType, REL_CONTAINS, Relation};
use surveyor_engine::{
    DataSource, Dispatcher, EngineError, Finding, PluginRegistry, Session, SourcePlugin,
};

/// FQDN마다 고정 주소 하나
struct Addresses {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl DataSource for Addresses {
    fn name(&self) -> &str {
        "addresses"
    }

    fn trigger(&self) -> AssetType {
        AssetType::Fqdn
    }

    fn transforms(&self) -> Vec<AssetType> {
        vec![AssetType::IpAddress]
    }

    async fn query(&self, _asset: &Asset) -> Result<Vec<Finding>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Finding::new(
            Asset::ip("203.0.113.7".parse().unwrap()),
            Relation::simple("resolves_to"),
        )])
    }
}

/// 주소를 포함하는 /24
struct Blocks {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl DataSource for Blocks {
    fn name(&self) -> &str {
        "blocks"
    }

    fn trigger(&self) -> AssetType {
        AssetType::IpAddress
    }

    fn transforms(&self) -> Vec<AssetType> {
        vec![AssetType::Netblock]
    }

    async fn query(&self, asset: &Asset) -> Result<Vec<Finding>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ip = asset.as_ip().map(|v| v.address).unwrap();
        Ok(vec![Finding::new(
            Asset::netblock(Cidr::new(ip, 24).unwrap()),
            Relation::simple(REL_CONTAINS),
        )])
    }
}

/// 항상 실패
struct Broken;

#[async_trait]
impl DataSource for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn trigger(&self) -> AssetType {
        AssetType::Fqdn
    }

    fn transforms(&self) -> Vec<AssetType> {
        vec![AssetType::IpAddress]
    }

    async fn query(&self, _asset: &Asset) -> Result<Vec<Finding>, EngineError> {
        Err(EngineError::SourceUnavailable {
            source_name: "broken".to_owned(),
            reason: "connection refused".to_owned(),
        })
    }
}

struct Chain {
    dispatcher: Arc<Dispatcher>,
    graph: Arc<MemoryGraph>,
    config: Arc<SurveyorConfig>,
    address_calls: Arc<AtomicUsize>,
    block_calls: Arc<AtomicUsize>,
    plugins: PluginRegistry,
}

async fn chain(rules: Vec<Transformation>) -> Chain {
    let mut config = SurveyorConfig::default();
    config.transformations = rules;
    let config = Arc::new(config);

    let address_calls = Arc::new(AtomicUsize::new(0));
    let block_calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Arc::new(Dispatcher::new(8));

    let mut plugins = PluginRegistry::new();
    plugins
        .register(Box::new(SourcePlugin::from_config(
            Addresses {
                calls: Arc::clone(&address_calls),
            },
            &config,
        )))
        .unwrap();
    plugins
        .register(Box::new(SourcePlugin::from_config(
            Blocks {
                calls: Arc::clone(&block_calls),
            },
            &config,
        )))
        .unwrap();
    plugins
        .register(Box::new(SourcePlugin::from_config(Broken, &config)))
        .unwrap();
    plugins.start_all(&dispatcher).await.unwrap();

    Chain {
        dispatcher,
        graph: Arc::new(MemoryGraph::new()),
        config,
        address_calls,
        block_calls,
        plugins,
    }
}

impl Chain {
    async fn run(&self, seed: &str) -> Arc<Session> {
        let mut scope = Scope::with_domains(["example.com"]).unwrap();
        scope.add_cidr("203.0.113.0/24".parse().unwrap());
        let session = Session::new(
            Arc::clone(&self.config),
            Arc::clone(&self.graph) as Arc<dyn AssetGraph>,
            Arc::new(scope),
            Arc::clone(&self.dispatcher),
        )
        .unwrap();
        let entity = self.graph.create_asset(Asset::fqdn(seed)).await.unwrap();
        session.dispatch(entity, "seed").unwrap();
        tokio::time::timeout(Duration::from_secs(5), session.wait_idle())
            .await
            .expect("session should quiesce");
        session
    }
}

fn full_rules() -> Vec<Transformation> {
    vec![
        Transformation::new("FQDN", "IPAddress"),
        Transformation::new("IPAddress", "Netblock"),
    ]
}

#[tokio::test]
async fn findings_chain_through_dispatch() {
    let chain = chain(full_rules()).await;

    let session = chain.run("www.example.com").await;

    assert_eq!(chain.address_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.block_calls.load(Ordering::SeqCst), 1);
    let blocks = chain
        .graph
        .find_entities_by_type(AssetType::Netblock, None)
        .await
        .unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].asset.key(), "203.0.113.0/24");

    // 실패한 소스는 다른 핸들러를 막지 않고 에러로만 집계됨
    assert_eq!(session.stats().handler_errors, 1);
    session.close().await;
}

#[tokio::test]
async fn chain_stops_where_transformations_end() {
    let chain = chain(vec![Transformation::new("FQDN", "IPAddress")]).await;

    let session = chain.run("www.example.com").await;

    assert_eq!(chain.address_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.block_calls.load(Ordering::SeqCst), 0);
    // 전이 불일치는 에러가 아님
    assert_eq!(session.stats().handler_errors, 1);
}

#[tokio::test]
async fn second_session_reuses_fresh_results() {
    let chain = chain(full_rules()).await;

    chain.run("www.example.com").await.close().await;
    let second = chain.run("www.example.com").await;

    // 워터마크가 창 안이므로 외부 질의 없이 그래프에서 다시 디스패치
    assert_eq!(chain.address_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.block_calls.load(Ordering::SeqCst), 1);
    assert!(second.stats().handler_invocations >= 3);
}

#[tokio::test]
async fn stop_all_stops_every_plugin() {
    let mut chain = chain(full_rules()).await;

    chain.plugins.stop_all().await.unwrap();
    chain.dispatcher.shutdown().await;

    assert!(
        chain
            .plugins
            .states()
            .iter()
            .all(|(_, state)| *state == surveyor_engine::PluginState::Stopped)
    );
}

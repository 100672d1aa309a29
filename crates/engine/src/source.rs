//! 외부 데이터 소스 어댑터
//!
//! [`DataSource`]를 구현한 모듈은 [`SourcePlugin`]으로 감싸 하나의 핸들러로
//! 등록됩니다. 핸들러는 다음 순서로 동작합니다.
//!
//! 1. 이벤트 엔티티 타입 확인 (불일치 시 `AssetMismatch`)
//! 2. 소스가 생산하는 타입별 전이 확인과 TTL 시작 시각 계산
//! 3. 워터마크가 창 안에 있으면 그래프의 기존 엣지를 다시 디스패치
//! 4. 아니면 속도 제한 대기 후 질의, 결과 기록, 디스패치, 워터마크 갱신
//!
//! 질의가 `SourceUnavailable`로 실패하면 워터마크를 갱신하지 않으므로
//! 다음 창에서 같은 소스를 다시 시도합니다.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use surveyor_core::config::SurveyorConfig;
use surveyor_core::error::SurveyorError;
use surveyor_core::metrics as m;
use surveyor_core::rate_limit::{RateLimitConfig, RateLimiter};
use surveyor_core::types::{Asset, AssetType, EdgeRequest, Entity, Property, Relation, Source};
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::event::Event;
use crate::plugin::{Plugin, PluginInfo, PluginState};
use crate::registry::Handler;
use crate::session::Session;
use crate::ttl::{asset_monitored_within_ttl, mark_asset_monitored, ttl_start_time};

/// 외부 소스가 돌려준 발견 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub asset: Asset,
    /// 트리거 엔티티에서 발견 에셋으로 향하는 관계
    pub relation: Relation,
}

impl Finding {
    pub fn new(asset: Asset, relation: Relation) -> Self {
        Self { asset, relation }
    }
}

/// 외부 데이터 소스
///
/// 응답 파싱은 구현체의 몫이며, 네트워크/API 실패는 `SourceUnavailable`로 보고합니다.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// 소스 이름 (`[data_sources.<name>]` 키와 변환 규칙 대상에 사용)
    fn name(&self) -> &str;

    /// 핸들러를 트리거하는 에셋 타입
    fn trigger(&self) -> AssetType;

    /// 이 소스가 생산할 수 있는 에셋 타입
    fn transforms(&self) -> Vec<AssetType>;

    async fn query(&self, asset: &Asset) -> Result<Vec<Finding>, EngineError>;
}

/// 스코프로 판정할 수 있는 타입은 스코프 안일 때만 후속 디스패치합니다.
pub fn should_follow(session: &Session, asset: &Asset) -> bool {
    match asset.asset_type() {
        AssetType::Fqdn
        | AssetType::DomainRecord
        | AssetType::EmailAddress
        | AssetType::Url
        | AssetType::IpAddress
        | AssetType::Netblock
        | AssetType::IpNetRecord
        | AssetType::AutonomousSystem
        | AssetType::AutnumRecord => session.scope().is_asset_in_scope(asset, 0).0.is_some(),
        _ => true,
    }
}

// ─── SourceHandler ───────────────────────────────────────────────────

/// TTL 게이트와 속도 제한을 적용하는 소스 핸들러
pub struct SourceHandler<D> {
    source: D,
    limiter: RateLimiter,
}

impl<D: DataSource> SourceHandler<D> {
    pub fn new(source: D, rate_limit: RateLimitConfig) -> Self {
        Self {
            source,
            limiter: RateLimiter::new(rate_limit),
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    /// 핸들러 이름: `<소스>-<트리거 타입>`
    pub fn handler_name(&self) -> String {
        format!("{}-{}", self.source.name(), self.source.trigger())
    }

    /// 이벤트 하나를 처리합니다.
    pub async fn handle(&self, event: Event) -> Result<(), EngineError> {
        let name = self.source.name();
        let expected = self.source.trigger();
        let actual = event.asset_type();
        if actual != expected {
            return Err(EngineError::AssetMismatch {
                handler: self.handler_name(),
                expected,
                actual,
            });
        }

        let session = Arc::clone(&event.session);
        let (allowed, since) = self.permitted_targets(&session, actual)?;
        let source = session.source(name);
        let graph = Arc::clone(session.graph());

        if asset_monitored_within_ttl(graph.as_ref(), &event.entity, &source, since).await {
            metrics::counter!(m::TTL_CACHE_HITS_TOTAL, m::LABEL_HANDLER => name.to_owned())
                .increment(1);
            return self.replay_cached(&event, &allowed, since).await;
        }
        metrics::counter!(m::TTL_CACHE_MISSES_TOTAL, m::LABEL_HANDLER => name.to_owned())
            .increment(1);

        tokio::select! {
            _ = session.cancel_token().cancelled() => return Ok(()),
            _ = self.limiter.wait() => {}
        }

        // SourceUnavailable은 워터마크를 남기지 않고 그대로 반환
        let findings = self.source.query(&event.entity.asset).await?;
        debug!(source = name, findings = findings.len(), "source query complete");

        for finding in findings {
            if session.is_cancelled() {
                return Ok(());
            }
            if !allowed.contains(&finding.asset.asset_type()) {
                continue;
            }
            match store_finding(&session, &event.entity, &source, finding).await {
                Ok(entity) => {
                    if should_follow(&session, &entity.asset) {
                        let asset = entity.asset.to_string();
                        if let Err(e) = session.dispatcher().dispatch(event.child(entity, name)) {
                            debug!(source = name, %asset, error = %e, "finding dispatch rejected");
                        }
                    }
                }
                Err(e) => warn!(source = name, error = %e, "finding dropped"),
            }
        }

        mark_asset_monitored(graph.as_ref(), &event.entity, &source).await
    }

    /// 허용된 생산 타입과 그중 가장 엄격한(가장 늦은) TTL 시작 시각
    fn permitted_targets(
        &self,
        session: &Session,
        from: AssetType,
    ) -> Result<(Vec<AssetType>, DateTime<Utc>), EngineError> {
        let name = self.source.name();
        let mut allowed = Vec::new();
        let mut since: Option<DateTime<Utc>> = None;
        for to in self.source.transforms() {
            match ttl_start_time(session.matcher(), from, to.as_str(), name) {
                Ok(start) => {
                    allowed.push(to);
                    since = Some(since.map_or(start, |s| s.max(start)));
                }
                Err(EngineError::TransformMismatch { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        match since {
            Some(since) => Ok((allowed, since)),
            None => Err(EngineError::TransformMismatch {
                from: from.to_string(),
                to: name.to_owned(),
            }),
        }
    }

    /// 창 안에서 이미 수집된 결과를 그래프에서 읽어 다시 디스패치합니다.
    async fn replay_cached(
        &self,
        event: &Event,
        allowed: &[AssetType],
        since: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let session = &event.session;
        let graph = session.graph();
        let edges = graph.outgoing_edges(&event.entity, Some(since), &[]).await?;
        for edge in edges {
            if session.is_cancelled() {
                break;
            }
            let target = match graph.find_entity_by_id(&edge.to_id).await {
                Ok(target) => target,
                Err(e) => {
                    debug!(edge = %edge.id, error = %e, "cached edge target missing");
                    continue;
                }
            };
            if allowed.contains(&target.asset.asset_type()) && should_follow(session, &target.asset)
            {
                let asset = target.asset.to_string();
                if let Err(e) = session
                    .dispatcher()
                    .dispatch(event.child(target, self.source.name()))
                {
                    debug!(source = self.source.name(), %asset, error = %e, "cached dispatch rejected");
                }
            }
        }
        Ok(())
    }
}

/// 발견 에셋, 엣지, 출처 속성을 그래프에 기록합니다.
pub async fn store_finding(
    session: &Session,
    from: &Entity,
    source: &Source,
    finding: Finding,
) -> Result<Entity, EngineError> {
    let graph = session.graph();
    let entity = graph.create_asset(finding.asset).await?;
    let edge = graph
        .create_edge(EdgeRequest::new(finding.relation, from, &entity))
        .await?;
    graph
        .create_entity_property(&entity, Property::Source(source.into()))
        .await?;
    graph
        .create_edge_property(&edge, Property::Source(source.into()))
        .await?;
    Ok(entity)
}

// ─── SourcePlugin ────────────────────────────────────────────────────

/// 소스 하나를 핸들러 하나로 등록하는 플러그인
pub struct SourcePlugin<D> {
    info: PluginInfo,
    state: PluginState,
    handler: Arc<SourceHandler<D>>,
    priority: i32,
    max_instances: usize,
}

impl<D: DataSource> SourcePlugin<D> {
    pub fn new(source: D, rate_limit: RateLimitConfig) -> Self {
        let info = PluginInfo::new(
            source.name(),
            env!("CARGO_PKG_VERSION"),
            format!("external data source '{}'", source.name()),
        );
        Self {
            info,
            state: PluginState::Created,
            handler: Arc::new(SourceHandler::new(source, rate_limit)),
            priority: 5,
            max_instances: 10,
        }
    }

    /// `[data_sources.<name>]`의 속도 제한을 사용합니다. 없으면 기본값.
    pub fn from_config(source: D, config: &SurveyorConfig) -> Self {
        let rate_limit = config
            .data_source(source.name())
            .map(|ds| ds.rate_limit)
            .unwrap_or_default();
        Self::new(source, rate_limit)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }
}

impl<D: DataSource> Plugin for SourcePlugin<D> {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn start(&mut self, dispatcher: &Dispatcher) -> Result<(), SurveyorError> {
        if self.state == PluginState::Running {
            return Err(surveyor_core::error::PluginError::InvalidState {
                name: self.info.name.clone(),
                action: "start".to_owned(),
                state: self.state.to_string(),
            }
            .into());
        }

        let source = self.handler.source();
        let h = Arc::clone(&self.handler);
        let handler = Handler::new(
            source.name(),
            self.handler.handler_name(),
            source.trigger(),
            move |event| {
                let h = Arc::clone(&h);
                async move { h.handle(event).await }
            },
        )
        .with_priority(self.priority)
        .with_max_instances(self.max_instances)
        .with_transforms(source.transforms());

        if let Err(e) = dispatcher.register_handler(handler) {
            self.state = PluginState::Failed;
            return Err(e.into());
        }
        self.state = PluginState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SurveyorError> {
        self.state = PluginState::Stopped;
        Ok(())
    }
}

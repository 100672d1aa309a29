//! 탐색 세션 -- 세션 범위 상태의 소유자
//!
//! [`Session`]은 설정, 변환 매처, 그래프, 스코프, 디스패처, 취소 토큰을 묶고
//! 세션 동안만 유효한 집합(방문한 존 레벨, apex 인덱스, 디스패치된 엔티티)을
//! 소유합니다. 집합은 짧게 잡는 `std::sync::Mutex`로 보호하며 네트워크 I/O를
//! 가로질러 잠금을 유지하지 않습니다.
//!
//! # 종료
//! `close()`는 취소 신호를 보내고 진행 중인 작업이 빠질 때까지 기다린 뒤
//! 세션 집합을 해제합니다.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use surveyor_core::config::SurveyorConfig;
use surveyor_core::graph::AssetGraph;
use surveyor_core::metrics as m;
use surveyor_core::scope::ScopeChecker;
use surveyor_core::transform::TransformationSet;
use surveyor_core::types::{Entity, Source, normalize_name};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::event::Event;

/// 세션 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// 핸들러 큐에 들어간 이벤트 수 (핸들러 단위)
    pub events_dispatched: u64,
    /// 이미 디스패치된 엔티티라서 건너뛴 이벤트 수
    pub events_deduplicated: u64,
    pub handler_invocations: u64,
    pub handler_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    deduplicated: AtomicU64,
    invocations: AtomicU64,
    errors: AtomicU64,
}

/// 탐색 세션
pub struct Session {
    id: String,
    config: Arc<SurveyorConfig>,
    matcher: TransformationSet,
    graph: Arc<dyn AssetGraph>,
    scope: Arc<dyn ScopeChecker>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,

    visited_zones: Mutex<HashSet<String>>,
    apex_names: Mutex<HashSet<String>>,
    dispatched: Mutex<HashSet<String>>,

    in_flight: AtomicUsize,
    idle: Notify,
    counters: Counters,
}

impl Session {
    /// 세션을 생성합니다.
    ///
    /// 변환 규칙 집합을 이 시점에 만들며, 규칙이 잘못되었으면 디스패치가
    /// 시작되기 전에 `Config` 에러로 실패합니다.
    pub fn new(
        config: Arc<SurveyorConfig>,
        graph: Arc<dyn AssetGraph>,
        scope: Arc<dyn ScopeChecker>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Arc<Self>, EngineError> {
        let matcher = config.transformation_set()?;
        let session = Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            matcher,
            graph,
            scope,
            dispatcher,
            cancel: CancellationToken::new(),
            visited_zones: Mutex::new(HashSet::new()),
            apex_names: Mutex::new(HashSet::new()),
            dispatched: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            counters: Counters::default(),
        });
        info!(session = %session.id, "session created");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SurveyorConfig {
        &self.config
    }

    pub fn matcher(&self) -> &TransformationSet {
        &self.matcher
    }

    pub fn graph(&self) -> &Arc<dyn AssetGraph> {
        &self.graph
    }

    pub fn scope(&self) -> &Arc<dyn ScopeChecker> {
        &self.scope
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 이름과 설정된 신뢰도로 출처를 만듭니다.
    ///
    /// `[data_sources.<name>]`의 신뢰도가 0이 아니면 그것을, 아니면 전역 기본값을 씁니다.
    pub fn source(&self, name: &str) -> Source {
        let confidence = self
            .config
            .data_source(name)
            .map(|ds| ds.confidence)
            .filter(|c| *c > 0)
            .unwrap_or(self.matcher.default_confidence());
        Source::new(name, confidence)
    }

    // ─── Session-scoped sets ─────────────────────────────────────────

    /// 존 레벨을 방문으로 표시합니다. 처음 방문이면 `true`.
    pub fn visit_zone(&self, name: &str) -> bool {
        lock(&self.visited_zones).insert(normalize_name(name))
    }

    /// NS 레코드를 가진 이름을 apex 후보로 등록합니다.
    pub fn add_apex(&self, name: &str) {
        lock(&self.apex_names).insert(normalize_name(name));
    }

    pub fn apex_candidates(&self) -> Vec<String> {
        lock(&self.apex_names).iter().cloned().collect()
    }

    /// 엔티티를 디스패치된 것으로 표시합니다. 처음이면 `true`.
    pub fn mark_dispatched(&self, entity_id: &str) -> bool {
        lock(&self.dispatched).insert(entity_id.to_owned())
    }

    // ─── Dispatch & quiescence ───────────────────────────────────────

    /// 엔티티를 새 추적 흐름의 이벤트로 디스패치합니다.
    pub fn dispatch(self: &Arc<Self>, entity: Entity, source_module: &str) -> Result<usize, EngineError> {
        let event = Event::new(entity, Arc::clone(self), source_module);
        self.dispatcher.dispatch(event)
    }

    /// 작업 하나를 진행 중으로 표시합니다. 가드가 drop되면 완료로 처리됩니다.
    pub fn begin_work(self: &Arc<Self>) -> WorkGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!(m::DISPATCH_IN_FLIGHT).set(now as f64);
        WorkGuard {
            session: Arc::clone(self),
        }
    }

    fn end_work(&self) {
        let prev = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!(m::DISPATCH_IN_FLIGHT).set(prev.saturating_sub(1) as f64);
        if prev == 1 {
            self.idle.notify_waiters();
        }
    }

    /// 큐에 있거나 실행 중인 작업 수
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 진행 중인 작업이 0이 될 때까지 기다립니다 (정지 상태).
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // 카운트 확인 전에 등록해야 notify_waiters를 놓치지 않음
            notified.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 세션을 종료합니다.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.wait_idle().await;

        let zones = {
            let mut set = lock(&self.visited_zones);
            let n = set.len();
            set.clear();
            n
        };
        lock(&self.apex_names).clear();
        lock(&self.dispatched).clear();
        debug!(session = %self.id, zones, "session state released");
        info!(session = %self.id, stats = ?self.stats(), "session closed");
    }

    // ─── Stats ───────────────────────────────────────────────────────

    pub(crate) fn record_dispatched(&self, n: u64) {
        self.counters.dispatched.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_deduplicated(&self) {
        self.counters.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation(&self, failed: bool) {
        self.counters.invocations.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            events_dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            events_deduplicated: self.counters.deduplicated.load(Ordering::Relaxed),
            handler_invocations: self.counters.invocations.load(Ordering::Relaxed),
            handler_errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("in_flight", &self.in_flight())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// 진행 중 작업 가드
///
/// 큐에 들어간 작업과 함께 이동하므로, 작업이 실행되지 못하고 버려져도
/// 카운터가 새지 않습니다.
#[derive(Debug)]
pub struct WorkGuard {
    session: Arc<Session>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.session.end_work();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use surveyor_core::graph::MemoryGraph;
    use surveyor_core::scope::Scope;

    fn session() -> Arc<Session> {
        let config = Arc::new(SurveyorConfig::default());
        let scope = Scope::with_domains(["example.com"]).unwrap();
        Session::new(
            config,
            Arc::new(MemoryGraph::new()),
            Arc::new(scope),
            Arc::new(Dispatcher::new(4)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn visit_zone_once() {
        let s = session();
        assert!(s.visit_zone("Example.com."));
        assert!(!s.visit_zone("example.com"));
        assert!(s.visit_zone("www.example.com"));
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_without_work() {
        let s = session();
        tokio::time::timeout(Duration::from_secs(1), s.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_idle_waits_for_guards() {
        let s = session();
        let guard = s.begin_work();
        assert_eq!(s.in_flight(), 1);

        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s.in_flight(), 0);
    }

    #[tokio::test]
    async fn close_cancels_and_releases_sets() {
        let s = session();
        s.visit_zone("example.com");
        s.add_apex("example.com");
        assert!(s.mark_dispatched("e1"));

        s.close().await;
        assert!(s.is_cancelled());
        assert!(s.apex_candidates().is_empty());
        // 해제 후에는 다시 처음으로 취급
        assert!(s.visit_zone("example.com"));
        assert!(s.mark_dispatched("e1"));
    }

    #[tokio::test]
    async fn source_uses_default_confidence() {
        let s = session();
        let src = s.source("crtsh");
        assert_eq!(src.name, "crtsh");
        assert_eq!(src.confidence, s.matcher().default_confidence());
    }
}

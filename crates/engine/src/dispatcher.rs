//! 이벤트 디스패처
//!
//! `dispatch`는 트리거 타입이 일치하는 핸들러들을 우선순위 내림차순으로 묶어
//! 이벤트마다 시작 작업 하나를 띄우고 즉시 반환합니다. 시작 작업은 핸들러를
//! 차례로 걸으며 핸들러별 동시 실행 슬롯(`max_instances`)과 워커 풀 슬롯을 얻은
//! 뒤에야 다음 핸들러로 넘어갑니다. 두 세마포어 모두 FIFO이므로 한 이벤트 안의
//! 핸들러는 우선순위 순서대로 시작됩니다.
//!
//! # 에러 격리
//! 콜백이 반환한 에러는 로그와 메트릭으로만 소비됩니다. 다른 핸들러, 다른
//! 이벤트, 세션에는 영향을 주지 않습니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use surveyor_core::metrics as m;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::EngineError;
use crate::event::Event;
use crate::pool::WorkerPool;
use crate::registry::{Handler, HandlerRegistry};
use crate::session::WorkGuard;

/// 시작을 기다리는 핸들러 호출 하나
struct Job {
    handler: Arc<Handler>,
    instances: Arc<Semaphore>,
    event: Event,
    guard: WorkGuard,
}

/// 이벤트 디스패처
pub struct Dispatcher {
    registry: HandlerRegistry,
    instances: Mutex<HashMap<String, Arc<Semaphore>>>,
    pool: WorkerPool,
    cancel: CancellationToken,
    starters: TaskTracker,
}

impl Dispatcher {
    /// 전역 동시 실행 상한이 `max_workers`인 디스패처를 생성합니다.
    pub fn new(max_workers: usize) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            instances: Mutex::new(HashMap::new()),
            pool: WorkerPool::new(max_workers),
            cancel: CancellationToken::new(),
            starters: TaskTracker::new(),
        }
    }

    /// 핸들러를 등록합니다.
    ///
    /// 같은 이름의 핸들러가 이미 있으면 `Plugin` 에러를 반환합니다.
    pub fn register_handler(&self, handler: Handler) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::PoolClosed);
        }
        let handler = self.registry.register(handler)?;
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handler.name.clone(),
                Arc::new(Semaphore::new(handler.max_instances)),
            );

        debug!(
            handler = %handler.name,
            plugin = %handler.plugin,
            event_type = %handler.event_type,
            priority = handler.priority,
            max_instances = handler.max_instances,
            "handler registered"
        );
        Ok(())
    }

    /// 이벤트를 해당 타입의 핸들러들에게 전달합니다.
    ///
    /// 시작 대기에 들어간 핸들러 수를 반환합니다. 세션 안에서 이미 디스패치된
    /// 엔티티는 다시 전달하지 않고 0을 반환합니다. Tokio 런타임 안에서 호출해야 합니다.
    pub fn dispatch(&self, event: Event) -> Result<usize, EngineError> {
        let session = Arc::clone(&event.session);
        if session.is_cancelled() {
            return Err(EngineError::SessionClosed(session.id().to_owned()));
        }
        if self.cancel.is_cancelled() {
            return Err(EngineError::PoolClosed);
        }

        let asset_type = event.asset_type();
        let handlers = self.registry.handlers_for(asset_type);
        if handlers.is_empty() {
            return Ok(0);
        }
        if !session.mark_dispatched(&event.entity.id) {
            metrics::counter!(m::DISPATCH_EVENTS_DEDUPLICATED_TOTAL).increment(1);
            session.record_deduplicated();
            return Ok(0);
        }

        // 가드는 여기서 잡아야 시작 작업이 돌기 전에도 세션이 바쁜 상태로 보임
        let jobs: Vec<Job> = {
            let instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
            handlers
                .into_iter()
                .filter_map(|handler| {
                    let slots = Arc::clone(instances.get(&handler.name)?);
                    Some(Job {
                        handler,
                        instances: slots,
                        event: event.clone(),
                        guard: session.begin_work(),
                    })
                })
                .collect()
        };
        let queued = jobs.len();

        self.starters.spawn(start_in_priority_order(
            jobs,
            self.pool.clone(),
            self.cancel.clone(),
        ));

        metrics::counter!(m::DISPATCH_EVENTS_TOTAL, m::LABEL_ASSET_TYPE => asset_type.as_str())
            .increment(queued as u64);
        session.record_dispatched(queued as u64);
        Ok(queued)
    }

    pub fn handler_count(&self) -> usize {
        self.registry.count()
    }

    /// 새 호출을 멈추고 실행 중인 콜백이 끝날 때까지 기다립니다.
    ///
    /// 시작을 기다리던 호출은 실행되지 않고 버려집니다.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.starters.close();
        self.starters.wait().await;
        self.pool.close_and_wait().await;
        info!(handlers = self.registry.count(), "dispatcher stopped");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.registry.count())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// 한 이벤트의 호출들을 주어진 순서대로 시작합니다.
///
/// 앞선 핸들러가 두 슬롯을 모두 얻기 전에는 다음 핸들러가 슬롯을 기다리지 않습니다.
/// 중간에 멈추면 남은 호출은 가드와 함께 버려집니다.
async fn start_in_priority_order(jobs: Vec<Job>, pool: WorkerPool, cancel: CancellationToken) {
    for job in jobs {
        let name = job.handler.name.clone();
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            permit = Arc::clone(&job.instances).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        let spawned = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            spawned = pool.spawn(async move {
                invoke(job).await;
                drop(permit);
            }) => spawned,
        };
        if let Err(e) = spawned {
            debug!(handler = %name, error = %e, "handler start abandoned");
            return;
        }
    }
}

async fn invoke(job: Job) {
    let Job {
        handler,
        event,
        guard,
        ..
    } = job;
    let session = Arc::clone(&event.session);
    if session.is_cancelled() {
        drop(guard);
        return;
    }

    let span = info_span!(
        "handler",
        session = %session.id(),
        handler = %handler.name,
        asset = %event.entity.asset,
    );
    let started = Instant::now();
    let result = (handler.callback)(event).instrument(span.clone()).await;
    let elapsed = started.elapsed().as_secs_f64();

    metrics::counter!(m::HANDLER_INVOCATIONS_TOTAL, m::LABEL_HANDLER => handler.name.clone())
        .increment(1);
    metrics::histogram!(m::HANDLER_DURATION_SECONDS, m::LABEL_HANDLER => handler.name.clone())
        .record(elapsed);

    span.in_scope(|| match result {
        Ok(()) => session.record_invocation(false),
        Err(e) if e.is_benign() => {
            session.record_invocation(false);
            debug!(error = %e, "handler produced no findings");
        }
        Err(e) => {
            session.record_invocation(true);
            metrics::counter!(m::HANDLER_ERRORS_TOTAL, m::LABEL_HANDLER => handler.name.clone())
                .increment(1);
            warn!(error = %e, "handler failed");
        }
    });
    drop(guard);
}

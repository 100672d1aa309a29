//! 바운디드 워커 풀
//!
//! 디스패처가 시작하는 핸들러 호출을 전역 동시 실행 상한 아래에서 실행합니다.
//! `spawn`은 슬롯이 빌 때까지 기다립니다(backpressure). 세마포어는 FIFO이므로
//! 먼저 기다린 호출이 먼저 슬롯을 얻습니다.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::error::EngineError;

/// 세마포어 기반 작업 풀
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    capacity: usize,
}

impl WorkerPool {
    /// `capacity`개의 동시 실행 슬롯을 가진 풀을 생성합니다. 0은 1로 올립니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            tracker: TaskTracker::new(),
            capacity,
        }
    }

    /// 슬롯을 기다린 뒤 작업을 실행합니다.
    ///
    /// 풀이 닫혔으면 `PoolClosed`를 반환합니다.
    pub async fn spawn<F>(&self, task: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::PoolClosed)?;
        self.tracker.spawn(async move {
            task.await;
            drop(permit);
        });
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 새 작업을 거부하고 실행 중인 작업이 모두 끝날 때까지 기다립니다.
    pub async fn close_and_wait(&self) {
        self.permits.close();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn spawn_runs_task() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        pool.spawn(async move {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
        pool.close_and_wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_capacity() {
        let pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..12 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }
        pool.close_and_wait().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn spawn_after_close_fails() {
        let pool = WorkerPool::new(1);
        pool.close_and_wait().await;
        let err = pool.spawn(async {}).await.unwrap_err();
        assert!(matches!(err, EngineError::PoolClosed));
    }

    #[test]
    fn zero_capacity_rounds_up() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.capacity(), 1);
    }
}

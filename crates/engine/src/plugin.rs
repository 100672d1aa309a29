//! 플러그인 시스템 -- 탐색 모듈 등록과 생명주기 관리
//!
//! 각 탐색 모듈은 [`Plugin`]을 구현하고, `start`에서 자신의 핸들러를
//! [`Dispatcher`]에 등록합니다. [`PluginRegistry`]는 컴파일 타임에 구성된
//! 플러그인 목록을 등록 순서대로 시작/정지합니다. 동적 로딩은 없습니다.
//!
//! # 생명주기
//! ```text
//! Created → start(dispatcher) → Running → stop() → Stopped
//! ```

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use surveyor_core::error::{PluginError, SurveyorError};

use crate::dispatcher::Dispatcher;

// ─── PluginInfo ──────────────────────────────────────────────────────

/// 플러그인 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// 플러그인 고유 이름 (예: `"DNS"`)
    pub name: String,
    pub version: String,
    pub description: String,
}

impl PluginInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

// ─── PluginState ─────────────────────────────────────────────────────

/// 플러그인 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// 생성됨 (start 전)
    Created,
    /// 핸들러 등록 완료
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ─── Plugin Trait ────────────────────────────────────────────────────

/// 모든 탐색 모듈이 구현하는 플러그인 trait
///
/// # 구현 예시
/// ```ignore
/// impl Plugin for MyPlugin {
///     fn info(&self) -> &PluginInfo { &self.info }
///     fn state(&self) -> PluginState { self.state }
///
///     async fn start(&mut self, dispatcher: &Dispatcher) -> Result<(), SurveyorError> {
///         dispatcher.register_handler(self.handler())?;
///         self.state = PluginState::Running;
///         Ok(())
///     }
///     async fn stop(&mut self) -> Result<(), SurveyorError> {
///         self.state = PluginState::Stopped;
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// 플러그인 메타데이터를 반환합니다.
    fn info(&self) -> &PluginInfo;

    /// 현재 플러그인 상태를 반환합니다.
    fn state(&self) -> PluginState;

    /// 핸들러를 디스패처에 등록합니다.
    ///
    /// `Created` 또는 `Stopped` 상태에서만 호출 가능합니다.
    fn start(
        &mut self,
        dispatcher: &Dispatcher,
    ) -> impl Future<Output = Result<(), SurveyorError>> + Send;

    /// 플러그인이 소유한 자원(리졸버, 클라이언트 등)을 정리합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), SurveyorError>> + Send;
}

// ─── DynPlugin Trait ─────────────────────────────────────────────────

/// dyn-compatible 플러그인 trait
///
/// `Plugin` trait은 RPITIT를 사용하므로 `dyn Plugin`이 불가합니다.
/// `DynPlugin`은 `BoxFuture`를 반환하여 `Vec<Box<dyn DynPlugin>>`으로
/// 플러그인을 관리할 수 있게 합니다.
pub trait DynPlugin: Send + Sync {
    fn info(&self) -> &PluginInfo;

    fn state(&self) -> PluginState;

    fn start<'a>(
        &'a mut self,
        dispatcher: &'a Dispatcher,
    ) -> BoxFuture<'a, Result<(), SurveyorError>>;

    fn stop(&mut self) -> BoxFuture<'_, Result<(), SurveyorError>>;
}

/// Plugin을 구현한 타입은 자동으로 DynPlugin도 구현됩니다.
impl<T: Plugin> DynPlugin for T {
    fn info(&self) -> &PluginInfo {
        Plugin::info(self)
    }

    fn state(&self) -> PluginState {
        Plugin::state(self)
    }

    fn start<'a>(
        &'a mut self,
        dispatcher: &'a Dispatcher,
    ) -> BoxFuture<'a, Result<(), SurveyorError>> {
        Box::pin(Plugin::start(self, dispatcher))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), SurveyorError>> {
        Box::pin(Plugin::stop(self))
    }
}

// ─── PluginRegistry ──────────────────────────────────────────────────

/// 플러그인 레지스트리
///
/// 등록 순서가 보존되며, 시작과 정지 모두 등록 순서를 따릅니다.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn DynPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// 플러그인을 등록합니다.
    ///
    /// 동일한 이름(대소문자 무시)의 플러그인이 이미 있으면 에러를 반환합니다.
    pub fn register(&mut self, plugin: Box<dyn DynPlugin>) -> Result<(), SurveyorError> {
        let name = plugin.info().name.clone();
        if self
            .plugins
            .iter()
            .any(|p| p.info().name.eq_ignore_ascii_case(&name))
        {
            return Err(PluginError::AlreadyRegistered { name }.into());
        }
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn DynPlugin> {
        self.plugins
            .iter()
            .find(|p| p.info().name.eq_ignore_ascii_case(name))
            .map(|p| p.as_ref())
    }

    /// 모든 플러그인을 등록 순서대로 시작합니다.
    ///
    /// 첫 실패에서 멈추며, 이미 시작된 플러그인의 정리는 호출자의 `stop_all` 몫입니다.
    /// 핸들러를 하나도 등록하지 않은 플러그인은 경고만 남깁니다.
    pub async fn start_all(&mut self, dispatcher: &Dispatcher) -> Result<(), SurveyorError> {
        for plugin in &mut self.plugins {
            let before = dispatcher.handler_count();
            plugin.start(dispatcher).await?;
            let added = dispatcher.handler_count().saturating_sub(before);
            if added == 0 {
                tracing::warn!(plugin = %plugin.info().name, "plugin registered no handlers");
            } else {
                tracing::info!(plugin = %plugin.info().name, handlers = added, "plugin started");
            }
        }
        Ok(())
    }

    /// 실행 중인 플러그인을 등록 순서대로 정지합니다.
    ///
    /// 개별 플러그인 정지 실패 시에도 나머지 플러그인의 정지를 계속합니다.
    /// 모든 에러를 수집하여 반환합니다.
    pub async fn stop_all(&mut self) -> Result<(), SurveyorError> {
        let mut errors = Vec::new();
        for plugin in &mut self.plugins {
            if plugin.state() != PluginState::Running {
                continue;
            }
            if let Err(e) = plugin.stop().await {
                errors.push(format!("{}: {}", plugin.info().name, e));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PluginError::StopFailed(errors.join("; ")).into())
        }
    }

    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// 플러그인 이름과 상태 목록
    pub fn states(&self) -> Vec<(String, PluginState)> {
        self.plugins
            .iter()
            .map(|p| (p.info().name.clone(), p.state()))
            .collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

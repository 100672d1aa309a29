//! 핸들러 등록 레코드와 레지스트리
//!
//! [`Handler`]는 소유 플러그인, 고유 이름, 우선순위(높을수록 먼저), 동시 실행
//! 상한, 생산 가능한 에셋 타입, 트리거 타입, 콜백으로 구성됩니다.
//! [`HandlerRegistry`]는 트리거 타입별로 핸들러를 보관하고 우선순위 내림차순으로
//! 돌려줍니다.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use surveyor_core::error::PluginError;
use surveyor_core::types::AssetType;

use crate::error::EngineError;
use crate::event::Event;

/// 핸들러 콜백 타입
pub type HandlerCallback =
    Arc<dyn Fn(Event) -> BoxFuture<'static, Result<(), EngineError>> + Send + Sync>;

/// 기본 동시 실행 상한
pub const DEFAULT_MAX_INSTANCES: usize = 10;

/// 핸들러 등록 레코드
#[derive(Clone)]
pub struct Handler {
    pub plugin: String,
    pub name: String,
    pub priority: i32,
    pub max_instances: usize,
    pub transforms: Vec<AssetType>,
    pub event_type: AssetType,
    pub callback: HandlerCallback,
}

impl Handler {
    /// 비동기 클로저로 핸들러를 생성합니다.
    ///
    /// # 예시
    /// ```ignore
    /// let handler = Handler::new("DNS", "DNS-CNAME", AssetType::Fqdn, |event| async move {
    ///     // ...
    ///     Ok(())
    /// })
    /// .with_priority(8)
    /// .with_transforms([AssetType::Fqdn]);
    /// ```
    pub fn new<F, Fut>(
        plugin: impl Into<String>,
        name: impl Into<String>,
        event_type: AssetType,
        callback: F,
    ) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        Self {
            plugin: plugin.into(),
            name: name.into(),
            priority: 0,
            max_instances: DEFAULT_MAX_INSTANCES,
            transforms: Vec::new(),
            event_type,
            callback: Arc::new(move |event| Box::pin(callback(event))),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 동시 실행 상한을 지정합니다. 0은 1로 올립니다.
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances.max(1);
        self
    }

    pub fn with_transforms<I>(mut self, transforms: I) -> Self
    where
        I: IntoIterator<Item = AssetType>,
    {
        self.transforms = transforms.into_iter().collect();
        self
    }

    /// 이 핸들러가 `asset_type`을 생산할 수 있는지 확인합니다.
    pub fn produces(&self, asset_type: AssetType) -> bool {
        self.transforms.contains(&asset_type)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("plugin", &self.plugin)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("max_instances", &self.max_instances)
            .field("transforms", &self.transforms)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

/// 트리거 타입별 핸들러 레지스트리
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<AssetType, Vec<Arc<Handler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들러를 등록합니다.
    ///
    /// 같은 이름이 어느 트리거 타입에든 이미 등록되어 있으면 에러를 반환합니다.
    pub fn register(&self, handler: Handler) -> Result<Arc<Handler>, PluginError> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers
            .values()
            .flatten()
            .any(|h| h.name.eq_ignore_ascii_case(&handler.name))
        {
            return Err(PluginError::HandlerAlreadyRegistered { name: handler.name });
        }

        let handler = Arc::new(handler);
        let list = handlers.entry(handler.event_type).or_default();
        list.push(Arc::clone(&handler));
        // 같은 우선순위는 등록 순서를 유지
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(handler)
    }

    /// 트리거 타입에 등록된 핸들러를 우선순위 내림차순으로 반환합니다.
    pub fn handlers_for(&self, asset_type: AssetType) -> Vec<Arc<Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&asset_type)
            .cloned()
            .unwrap_or_default()
    }

    /// 등록된 핸들러 수
    pub fn count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// 등록된 모든 핸들러 이름 (트리거 타입 순서 무관)
    pub fn names(&self) -> Vec<String> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flatten()
            .map(|h| h.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str, event_type: AssetType, priority: i32) -> Handler {
        Handler::new("test", name, event_type, |_event| async { Ok(()) }).with_priority(priority)
    }

    #[test]
    fn duplicate_name_rejected() {
        let registry = HandlerRegistry::new();
        registry.register(noop("DNS-IP", AssetType::Fqdn, 9)).unwrap();

        let err = registry
            .register(noop("DNS-IP", AssetType::IpAddress, 1))
            .unwrap_err();
        assert!(matches!(err, PluginError::HandlerAlreadyRegistered { name } if name == "DNS-IP"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn handlers_sorted_by_descending_priority() {
        let registry = HandlerRegistry::new();
        registry.register(noop("low", AssetType::Fqdn, 1)).unwrap();
        registry.register(noop("high", AssetType::Fqdn, 9)).unwrap();
        registry.register(noop("mid", AssetType::Fqdn, 5)).unwrap();
        registry.register(noop("other", AssetType::IpAddress, 100)).unwrap();

        let names: Vec<String> = registry
            .handlers_for(AssetType::Fqdn)
            .iter()
            .map(|h| h.name.clone())
            .collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[test]
    fn equal_priority_keeps_registration_order() {
        let registry = HandlerRegistry::new();
        registry.register(noop("first", AssetType::Fqdn, 3)).unwrap();
        registry.register(noop("second", AssetType::Fqdn, 3)).unwrap();

        let handlers = registry.handlers_for(AssetType::Fqdn);
        assert_eq!(handlers[0].name, "first");
        assert_eq!(handlers[1].name, "second");
    }

    #[test]
    fn unknown_type_has_no_handlers() {
        let registry = HandlerRegistry::new();
        assert!(registry.handlers_for(AssetType::Phone).is_empty());
    }

    #[test]
    fn builder_sets_fields() {
        let handler = noop("h", AssetType::Fqdn, 0)
            .with_max_instances(0)
            .with_transforms([AssetType::IpAddress, AssetType::Fqdn]);
        assert_eq!(handler.max_instances, 1);
        assert!(handler.produces(AssetType::IpAddress));
        assert!(!handler.produces(AssetType::Netblock));
    }
}

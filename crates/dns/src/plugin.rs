//! DNS 탐색 플러그인
//!
//! 하나의 [`DnsPlugin`]이 다섯 개의 핸들러를 등록합니다.
//!
//! | 핸들러 | 트리거 | 우선순위 |
//! |--------|--------|----------|
//! | `DNS-CNAME` | FQDN | 9 |
//! | `DNS-IP` | FQDN | 8 |
//! | `DNS-Reverse` | IPAddress | 8 |
//! | `DNS-TXT` | FQDN | 7 |
//! | `DNS-Subs` | FQDN | 6 |

use std::future::Future;
use std::sync::Arc;

use surveyor_core::config::SurveyorConfig;
use surveyor_core::error::{PluginError, SurveyorError};
use surveyor_core::types::AssetType;
use surveyor_engine::{Dispatcher, EngineError, Event, Handler, Plugin, PluginInfo, PluginState};
use tracing::info;

use crate::context::{
    DnsContext, HANDLER_ADDRESS, HANDLER_CNAME, HANDLER_REVERSE, HANDLER_SUBS, HANDLER_TXT,
};
use crate::error::{DNS_SOURCE, DnsError};
use crate::resolver::{DnsClient, ResolverPool};
use crate::{address, cname, reverse, txt, zone};

/// DNS 플러그인
pub struct DnsPlugin {
    info: PluginInfo,
    state: PluginState,
    ctx: Arc<DnsContext>,
    pool: Option<Arc<ResolverPool>>,
}

impl DnsPlugin {
    /// 주어진 클라이언트로 플러그인을 생성합니다.
    pub fn new(client: Arc<dyn DnsClient>) -> Result<Self, DnsError> {
        Ok(Self {
            info: PluginInfo::new(
                DNS_SOURCE,
                env!("CARGO_PKG_VERSION"),
                "DNS resolution, reverse lookups, IP sweeps and zone walking",
            ),
            state: PluginState::Created,
            ctx: Arc::new(DnsContext::new(client)?),
            pool: None,
        })
    }

    /// `[dns]` 설정으로 리졸버 풀을 만들어 플러그인을 생성합니다.
    pub fn from_config(config: &SurveyorConfig) -> Result<Self, DnsError> {
        let pool = Arc::new(ResolverPool::from_config(&config.dns)?);
        let mut plugin = Self::new(pool.clone())?;
        plugin.pool = Some(pool);
        Ok(plugin)
    }

    /// 설정으로 만든 경우의 리졸버 풀 (리졸버 교체용)
    pub fn resolver_pool(&self) -> Option<&Arc<ResolverPool>> {
        self.pool.as_ref()
    }

    fn handler<F, Fut>(
        &self,
        name: &str,
        trigger: AssetType,
        priority: i32,
        transforms: &[AssetType],
        run: F,
    ) -> Handler
    where
        F: Fn(Arc<DnsContext>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        Handler::new(DNS_SOURCE, name, trigger, move |event| {
            run(Arc::clone(&ctx), event)
        })
        .with_priority(priority)
        .with_transforms(transforms.iter().copied())
    }

    fn handlers(&self) -> Vec<Handler> {
        vec![
            self.handler(
                HANDLER_CNAME,
                AssetType::Fqdn,
                9,
                &[AssetType::Fqdn],
                |ctx, event| async move { cname::handle(&ctx, event).await },
            ),
            self.handler(
                HANDLER_ADDRESS,
                AssetType::Fqdn,
                8,
                &[AssetType::IpAddress, AssetType::Fqdn],
                |ctx, event| async move { address::handle(&ctx, event).await },
            ),
            self.handler(
                HANDLER_REVERSE,
                AssetType::IpAddress,
                8,
                &[AssetType::Fqdn, AssetType::IpAddress],
                |ctx, event| async move { reverse::handle(&ctx, event).await },
            ),
            self.handler(
                HANDLER_TXT,
                AssetType::Fqdn,
                7,
                &[],
                |ctx, event| async move { txt::handle(&ctx, event).await },
            ),
            self.handler(
                HANDLER_SUBS,
                AssetType::Fqdn,
                6,
                &[AssetType::Fqdn],
                |ctx, event| async move { zone::handle_subs(&ctx, event).await },
            ),
        ]
    }
}

impl Plugin for DnsPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn start(&mut self, dispatcher: &Dispatcher) -> Result<(), SurveyorError> {
        if self.state == PluginState::Running {
            return Err(PluginError::InvalidState {
                name: self.info.name.clone(),
                action: "start".to_owned(),
                state: self.state.to_string(),
            }
            .into());
        }

        let handlers = self.handlers();
        let count = handlers.len();
        for handler in handlers {
            if let Err(e) = dispatcher.register_handler(handler) {
                self.state = PluginState::Failed;
                return Err(e.into());
            }
        }
        self.state = PluginState::Running;
        info!(plugin = %self.info.name, handlers = count, "dns plugin started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SurveyorError> {
        self.state = PluginState::Stopped;
        Ok(())
    }
}

impl std::fmt::Debug for DnsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsPlugin")
            .field("info", &self.info)
            .field("state", &self.state)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

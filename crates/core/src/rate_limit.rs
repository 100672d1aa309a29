//! 외부 소스별 요청 속도 제한
//!
//! 모든 외부 소스 핸들러와 DNS 리졸버 풀은 같은 추상화를 사용합니다.
//! 대기는 호출한 태스크만 멈추며 디스패처나 다른 핸들러를 막지 않습니다.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// 속도 제한 설정
///
/// `interval_ms`마다 토큰 하나가 보충되며, 최대 `burst`개까지 누적됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 토큰 보충 간격 (밀리초)
    pub interval_ms: u64,
    /// 최대 버스트 크기
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            burst: 1,
        }
    }
}

impl RateLimitConfig {
    /// 초당 요청 수로 설정을 만듭니다. 버스트는 초당 요청 수와 같습니다.
    pub fn per_second(rate: u32) -> Self {
        let rate = rate.max(1);
        Self {
            interval_ms: (1000 / u64::from(rate)).max(1),
            burst: rate,
        }
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{field}.interval_ms"),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.burst == 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{field}.burst"),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

/// governor 기반 직접(비키) 속도 제한기
pub struct RateLimiter {
    inner: DirectLimiter,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// 설정으로 제한기를 생성합니다. 0 값은 최소값(1ms, 버스트 1)으로 보정됩니다.
    pub fn new(config: RateLimitConfig) -> Self {
        let period = Duration::from_millis(config.interval_ms.max(1));
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);
        Self {
            inner: GovernorRateLimiter::direct(quota),
            config,
        }
    }

    /// 토큰을 얻을 때까지 대기합니다.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }

    /// 대기 없이 토큰을 얻으면 `true`
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_second_config() {
        let cfg = RateLimitConfig::per_second(10);
        assert_eq!(cfg.interval_ms, 100);
        assert_eq!(cfg.burst, 10);
        assert_eq!(RateLimitConfig::per_second(0).burst, 1);
    }

    #[test]
    fn validate_rejects_zero_values() {
        let cfg = RateLimitConfig {
            interval_ms: 0,
            burst: 1,
        };
        assert!(cfg.validate("data_sources.x.rate_limit").is_err());
        let cfg = RateLimitConfig {
            interval_ms: 10,
            burst: 0,
        };
        let err = cfg.validate("dns").unwrap_err();
        assert!(err.to_string().contains("dns.burst"));
    }

    #[test]
    fn burst_is_exhausted() {
        let limiter = RateLimiter::new(RateLimitConfig {
            interval_ms: 60_000,
            burst: 2,
        });
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn wait_returns_when_token_available() {
        let limiter = RateLimiter::new(RateLimitConfig {
            interval_ms: 1,
            burst: 1,
        });
        limiter.wait().await;
        limiter.wait().await;
    }
}

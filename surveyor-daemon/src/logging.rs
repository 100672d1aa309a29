//! Logging initialization for surveyor-daemon.
//!
//! Builds the `tracing-subscriber` stack from `[general]`. Resolver
//! internals (`hickory_*`) are capped at `warn` unless `RUST_LOG` says
//! otherwise; a survey issues thousands of queries and their per-query
//! spans drown the discovery log.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use surveyor_core::config::GeneralConfig;

/// Crates whose logs are capped at `warn` by default.
const QUIET_TARGETS: &[&str] = &["hickory_proto", "hickory_resolver"];

/// Output format of the daemon log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line human-readable output
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

/// Filter directives for a configured level: the level itself plus the quiet targets.
pub fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_owned()];
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    directives.join(",")
}

/// Initialize the global tracing subscriber.
///
/// Must be called once, before the orchestrator is built.
/// `RUST_LOG` replaces the configured directives entirely.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.log_level))
            .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to initialize {:?} log output: {}", format, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_rejected() {
        // Given: A format the daemon does not support
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };

        // When / Then: Initialization fails before touching the global subscriber
        let err = init_tracing(&config).expect_err("xml must be rejected");
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }

    #[test]
    fn test_known_formats_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("JSON".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_resolver_targets_capped_at_warn() {
        let directives = default_directives("debug");

        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("hickory_proto=warn"));
        assert!(directives.contains("hickory_resolver=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}

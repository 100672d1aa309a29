//! Discovery orchestration -- assembly, seeding, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `surveyor-daemon`.
//! It builds the asset graph, scope, dispatcher and plugins from the
//! configuration, seeds the scope domains, and runs one discovery
//! session until it goes quiet or a shutdown signal arrives.
//!
//! # Shutdown Order
//!
//! 1. Session (cancel, wait for in-flight handlers, release session sets)
//! 2. Plugins (registration order)
//! 3. Dispatcher (stop handler loops, drain the worker pool)

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use surveyor_core::config::SurveyorConfig;
use surveyor_core::graph::{AssetGraph, GraphStats, MemoryGraph};
use surveyor_core::scope::{Scope, ScopeChecker};
use surveyor_core::types::Asset;
use surveyor_dns::DnsPlugin;
use surveyor_engine::{Dispatcher, PluginRegistry, Session, SessionStats};

use crate::metrics_server;

/// Source module name attached to seed events.
pub const SEED_MODULE: &str = "seed";

/// Outcome of a discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of seed assets dispatched.
    pub seeds: usize,
    /// Graph contents after the run.
    pub graph: GraphStats,
    /// Dispatch counters of the session.
    pub session: SessionStats,
    /// `true` when the run stopped on a signal instead of quiescence.
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: Arc<SurveyorConfig>,
    graph: Arc<MemoryGraph>,
    scope: Arc<Scope>,
    dispatcher: Arc<Dispatcher>,
    plugins: PluginRegistry,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read, parsed or validated
    /// - The DNS resolver pool cannot be built
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SurveyorConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the metrics recorder when `[metrics] enabled = true`, then
    /// registers the DNS plugin backed by the configured resolvers.
    pub fn build_from_config(config: SurveyorConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        tracing::info!(resolvers = ?config.dns.resolvers, "initializing DNS plugin");
        let dns = DnsPlugin::from_config(&config)
            .map_err(|e| anyhow::anyhow!("failed to build DNS plugin: {}", e))?;

        let mut plugins = PluginRegistry::new();
        plugins.register(Box::new(dns))?;

        Self::with_plugins(config, plugins)
    }

    /// Build with a caller-supplied plugin set.
    ///
    /// Used by tests to run discovery against scripted sources.
    pub fn with_plugins(config: SurveyorConfig, plugins: PluginRegistry) -> Result<Self> {
        let scope = Scope::from_config(&config.scope, config.engine.active)
            .map_err(|e| anyhow::anyhow!("invalid scope: {}", e))?;

        if config.transformations.is_empty() {
            tracing::warn!("no transformations configured; discovery will not expand seeds");
        }

        let dispatcher = Arc::new(Dispatcher::new(config.engine.max_workers));
        tracing::info!(
            total_plugins = plugins.count(),
            max_workers = config.engine.max_workers,
            "orchestrator initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            graph: Arc::new(MemoryGraph::new()),
            scope: Arc::new(scope),
            dispatcher,
            plugins,
        })
    }

    /// Start all plugins and run discovery until quiescence or a shutdown signal.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<RunSummary> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

        self.run_until(async move {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        })
        .await
    }

    /// Run discovery until the session goes idle or `shutdown` resolves.
    ///
    /// `shutdown` yields a label for the log line (e.g. the signal name).
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = &'static str>,
    {
        let started = Instant::now();

        tracing::info!("starting all plugins");
        if let Err(e) = self.plugins.start_all(&self.dispatcher).await {
            // Rollback: stop any plugins that were successfully started
            tracing::warn!("startup failed, rolling back already-started plugins");
            if let Err(stop_err) = self.plugins.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            self.dispatcher.shutdown().await;
            return Err(e.into());
        }
        if self.config.metrics.enabled {
            record_daemon_metrics(self.plugins.count(), self.dispatcher.handler_count());
        }

        let session = Session::new(
            self.config.clone(),
            self.graph.clone(),
            self.scope.clone(),
            self.dispatcher.clone(),
        )
        .map_err(|e| anyhow::anyhow!("failed to create session: {}", e))?;

        let seeds = match self.seed(&session).await {
            Ok(n) => n,
            Err(e) => {
                session.close().await;
                self.shutdown().await;
                return Err(e);
            }
        };
        if seeds == 0 {
            tracing::warn!("no scope domains to seed; add [scope] domains or pass --domain");
        }

        tracing::info!(session = %session.id(), seeds, "discovery running");
        let interrupted = tokio::select! {
            _ = session.wait_idle() => {
                tracing::info!("discovery quiesced");
                false
            }
            signal = shutdown => {
                tracing::info!(signal = signal, "shutdown signal received");
                true
            }
        };

        session.close().await;
        self.shutdown().await;

        let graph = self
            .graph
            .stats()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read graph stats: {}", e))?;
        let summary = RunSummary {
            seeds,
            graph,
            session: session.stats(),
            interrupted,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            entities = summary.graph.entities,
            edges = summary.graph.edges,
            properties = summary.graph.properties,
            events = summary.session.events_dispatched,
            handler_errors = summary.session.handler_errors,
            interrupted,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "discovery finished"
        );
        Ok(summary)
    }

    /// Dispatch every scope domain as an FQDN seed. Returns the number dispatched.
    async fn seed(&self, session: &Arc<Session>) -> Result<usize> {
        let mut seeded = 0;
        for domain in self.scope.domains() {
            let entity = self
                .graph
                .create_asset(Asset::fqdn(&domain))
                .await
                .map_err(|e| anyhow::anyhow!("failed to create seed {}: {}", domain, e))?;
            session
                .dispatch(entity, SEED_MODULE)
                .map_err(|e| anyhow::anyhow!("failed to dispatch seed {}: {}", domain, e))?;
            tracing::debug!(fqdn = %domain, "seed dispatched");
            seeded += 1;
        }
        Ok(seeded)
    }

    /// Stop plugins, then the dispatcher. Plugin stop failures are logged.
    async fn shutdown(&mut self) {
        tracing::info!("stopping all plugins");
        if let Err(e) = self.plugins.stop_all().await {
            tracing::error!(error = %e, "plugin shutdown reported errors");
        }
        self.dispatcher.shutdown().await;
    }

    /// The asset graph the run writes into.
    pub fn graph(&self) -> &Arc<MemoryGraph> {
        &self.graph
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn config(&self) -> &SurveyorConfig {
        &self.config
    }
}

/// Record daemon-level gauges (build info, plugins and handlers registered).
fn record_daemon_metrics(plugin_count: usize, handler_count: usize) {
    use surveyor_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_PLUGINS_REGISTERED).set(plugin_count as f64);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_HANDLERS_REGISTERED).set(handler_count as f64);

    tracing::debug!(
        plugin_count,
        handler_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

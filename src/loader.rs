//! # Stub loader
//!
//! Owns the stub target and runs scenarios against it. A loader is built
//! once per load run: it either starts an embedded mock server or points at
//! a remote one, registers the chosen scenario's rules through a bounded
//! worker pool, and hands the effective base URL and run settings to the
//! external load driver.

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::LoadTestConfig;
use crate::error::Result;
use crate::pool::{PoolReport, WorkerPool};
use crate::scenario::{RequestTarget, Scenario, PROGRESS_EVERY};
use crate::stub::StubRule;
use crate::target::{EmbeddedTarget, RemoteTarget, StubTarget};

/// What the external load driver needs to exercise a populated server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadPlan {
    pub base_url: String,
    pub scenario: Scenario,
    pub duration_seconds: u64,
    pub rate: u32,
    pub ramp_seconds: u64,
    pub targets: Vec<RequestTarget>,
}

pub struct StubLoader {
    target: Arc<dyn StubTarget>,
    scheme: String,
    host: String,
    port: u16,
    config: LoadTestConfig,
}

impl StubLoader {
    /// Start an embedded server, or connect to the configured remote one
    pub async fn connect(config: LoadTestConfig) -> Result<Self> {
        info!(
            duration_seconds = config.duration_seconds,
            rate = config.rate,
            ramp_seconds = config.ramp_seconds,
            "Running for {} seconds at rate {}",
            config.duration_seconds,
            config.rate
        );

        match config.remote() {
            Some((scheme, host, port)) => {
                let (scheme, host) = (scheme.to_string(), host.to_string());
                info!("Target: {}://{}:{}", scheme, host, port);
                let target = RemoteTarget::new(&scheme, &host, port, config.task_timeout())?;
                Ok(Self::with_target(Arc::new(target), scheme, host, port, config))
            }
            None => {
                let target = EmbeddedTarget::start(&config.embedded_options()).await?;
                let port = target.port();
                info!(port, "Target: embedded mock server");
                Ok(Self::with_target(Arc::new(target), "http", "localhost", port, config))
            }
        }
    }

    /// Build a loader over an existing target, e.g. a test double
    pub fn with_target(
        target: Arc<dyn StubTarget>,
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        config: LoadTestConfig,
    ) -> Self {
        Self {
            target,
            scheme: scheme.into(),
            host: host.into(),
            port,
            config,
        }
    }

    /// Drop all registered stubs; call before each scenario
    pub async fn reset(&self) -> Result<()> {
        info!(base_url = %self.base_url(), "Running against: {}", self.base_url());
        self.target.reset().await
    }

    /// Register every rule of `scenario`.
    ///
    /// Setup steps (global delay, catch-all) propagate errors. Individual
    /// registrations that fail or time out are logged and listed in the
    /// returned report without stopping the rest.
    pub async fn run_scenario(&self, scenario: Scenario) -> Result<PoolReport> {
        let plan = scenario.plan(self.config.stub_count);
        info!(
            %scenario,
            rules = plan.rule_count,
            pool_size = plan.pool_size,
            "Registering stubs"
        );

        if let Some(delay) = plan.global_delay {
            self.target.set_global_random_delay(delay).await?;
        }
        if plan.catch_all {
            self.target.register(&StubRule::catch_all_not_found()).await?;
        }

        let mut pool = WorkerPool::new(
            plan.pool_size,
            self.config.task_timeout(),
            self.config.scenario_deadline(),
        );
        for index in 1..=plan.rule_count {
            let target = Arc::clone(&self.target);
            pool.submit(index, async move {
                let rule = scenario.rule(index);
                target.register(&rule).await.with_context(|| {
                    format!(
                        "registering {} {}",
                        rule.request.method,
                        rule.request.url.as_deref().unwrap_or("<any url>")
                    )
                })?;
                if index % PROGRESS_EVERY == 0 {
                    info!(%scenario, index, "registered {}", index);
                }
                Ok(())
            });
        }

        let report = pool.join().await;
        if report.is_clean() {
            info!(%scenario, registered = report.completed, "stubs registered");
        } else {
            warn!(
                %scenario,
                registered = report.completed,
                failed = report.failures.len(),
                timed_out = report.timed_out(),
                "stubs registered with failures"
            );
        }
        Ok(report)
    }

    /// Stop an owned embedded server; a no-op for remote targets
    pub async fn teardown(&self) -> Result<()> {
        self.target.stop().await
    }

    pub fn load_plan(&self, scenario: Scenario) -> LoadPlan {
        LoadPlan {
            base_url: self.base_url(),
            scenario,
            duration_seconds: self.config.duration_seconds,
            rate: self.config.rate,
            ramp_seconds: self.config.ramp_seconds,
            targets: scenario.request_targets(self.config.stub_count),
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.config.is_embedded()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/", self.scheme, self.host, self.port)
    }

    pub fn duration(&self) -> Duration {
        self.config.duration()
    }

    pub fn rate(&self) -> u32 {
        self.config.rate
    }

    pub fn ramp(&self) -> Duration {
        self.config.ramp()
    }

    pub fn stub_count(&self) -> usize {
        self.config.stub_count
    }
}

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::error::Result;
use crate::scenario::{Scenario, DEFAULT_STUB_COUNT};
use crate::target::EmbeddedOptions;

/// Environment variables read at startup
const ENV_KEYS: [&str; 11] = [
    "SCHEME",
    "HOST",
    "PORT",
    "DURATION_SECONDS",
    "RATE",
    "RAMP_SECONDS",
    "STUB_COUNT",
    "SCENARIO",
    "TASK_TIMEOUT_SECONDS",
    "SCENARIO_DEADLINE_SECONDS",
    "JOURNAL_ENTRIES",
];

/// Run configuration, assembled once and passed to the loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LoadTestConfig {
    pub scheme: String,
    /// No host means an embedded server is started
    pub host: Option<String>,
    /// 0 means an embedded server is started
    pub port: u16,
    #[validate(range(min = 1))]
    pub duration_seconds: u64,
    #[validate(range(min = 1))]
    pub rate: u32,
    pub ramp_seconds: u64,
    #[validate(range(min = 1))]
    pub stub_count: usize,
    pub scenario: Scenario,
    #[validate(range(min = 1))]
    pub task_timeout_seconds: u64,
    #[validate(range(min = 1))]
    pub scenario_deadline_seconds: u64,
    /// Size of the embedded server's request journal; 0 turns recording off
    pub journal_entries: usize,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: None,
            port: 0,
            duration_seconds: 30,
            rate: 200,
            ramp_seconds: 10,
            stub_count: DEFAULT_STUB_COUNT,
            scenario: Scenario::ManyStubGet,
            task_timeout_seconds: 30,
            scenario_deadline_seconds: 600,
            journal_entries: 200,
        }
    }
}

impl LoadTestConfig {
    /// Defaults, then `loadtest.toml`, then the process environment
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(LoadTestConfig::default()))
                .merge(Toml::file("loadtest.toml"))
                .merge(Env::raw().only(&ENV_KEYS)),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: LoadTestConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Remote target for `scheme://host:port`, or `None` for embedded mode
    pub fn remote(&self) -> Option<(&str, &str, u16)> {
        match self.host.as_deref() {
            Some(host) if !host.is_empty() && self.port != 0 => {
                Some((self.scheme.as_str(), host, self.port))
            }
            _ => None,
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.remote().is_none()
    }

    pub fn embedded_options(&self) -> EmbeddedOptions {
        EmbeddedOptions {
            journal_entries: self.journal_entries,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    pub fn ramp(&self) -> Duration {
        Duration::from_secs(self.ramp_seconds)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_seconds)
    }

    pub fn scenario_deadline(&self) -> Duration {
        Duration::from_secs(self.scenario_deadline_seconds)
    }
}

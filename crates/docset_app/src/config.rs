//! Optional RON configuration for the `docset` binary.
//!
//! Every field has a default, so a file only needs the values it changes.
//! Command line flags are applied on top with [`AppConfig::apply`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use docset_engine::{
    EngineConfig, FetchSettings, LocalizerSettings, RetryPolicy, DEFAULT_CONCURRENCY,
    DEFAULT_MAX_ATTEMPTS,
};
use engine_logging::engine_info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLATFORM_FAMILY: &str = "cljdoc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_image_bytes: u64,
    pub user_agent: String,
    pub platform_family: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        let retry = RetryPolicy::default();
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: retry.base_delay.as_millis() as u64,
            request_timeout_ms: fetch.request_timeout.as_millis() as u64,
            connect_timeout_ms: fetch.connect_timeout.as_millis() as u64,
            max_image_bytes: fetch.max_bytes,
            user_agent: fetch.user_agent,
            platform_family: DEFAULT_PLATFORM_FAMILY.to_string(),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
}

impl AppConfig {
    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config: Self = ron::from_str(&content)
            .with_context(|| format!("cannot parse config {}", path.display()))?;
        engine_info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.max_attempts = max_attempts;
        }
        self
    }

    pub fn engine_config(&self, localize_images: bool) -> EngineConfig {
        let fetch = FetchSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_bytes: self.max_image_bytes,
            user_agent: self.user_agent.clone(),
            ..FetchSettings::default()
        };
        EngineConfig {
            fetch,
            localizer: LocalizerSettings {
                concurrency: self.concurrency.max(1),
                retry: RetryPolicy {
                    max_attempts: self.max_attempts.max(1),
                    base_delay: Duration::from_millis(self.retry_base_delay_ms),
                },
            },
            localize_images,
        }
    }
}

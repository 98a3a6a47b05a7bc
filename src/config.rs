//! Application configuration: the debug flag and named middleware groups.
//!
//! Loaded from a YAML file at startup and merged into the middleware
//! registry by the app builder. `SWYD_DEBUG` overrides the file's debug
//! flag so a deployment can flip stack exposure without editing config.
//!
//! ```yaml
//! debug: false
//! groups:
//!   http: [request_log, cors]
//!   form: [csrf]
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Startup configuration consumed by [`crate::server::AppBuilder`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// When enabled, failure records and 5xx logs include captured
    /// backtraces. Never enable in production-facing deployments.
    #[serde(default)]
    pub debug: bool,
    /// Named middleware groups, merged into the registry at build time.
    /// A group named `http` is applied to every route ahead of the
    /// route's own middleware list.
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

impl AppConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = serde_yaml::from_str(yaml).context("failed to parse app config")?;
        Ok(cfg.with_env_overrides())
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }

    /// Apply environment overrides (`SWYD_DEBUG`).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("SWYD_DEBUG") {
            self.debug = matches!(val.as_str(), "1" | "true" | "yes");
        }
        self
    }
}

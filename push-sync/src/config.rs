//! Configuration management for the sync client.
//!
//! Loads configuration from a TOML file; command-line flags override it.
//! Every default (agent context, target directory, timeout) is a field here
//! rather than a constant buried in a component.

use crate::fs::PathFilter;
use crate::utils::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local source directory; relative paths resolve against `base_dir`
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Directory relative sources are resolved against
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default)]
    pub remote: RemoteConfig,

    /// Remote target directory (defaults to the host name)
    #[serde(default)]
    pub target: Option<String>,

    /// Send the whole filtered tree without negotiating
    #[serde(default)]
    pub full: bool,

    /// Ask the agent to delete target files absent from the manifest
    #[serde(default)]
    pub prune_stale: bool,

    /// Only files ending with this suffix are synchronized
    #[serde(default)]
    pub includes: Option<String>,

    /// Files ending with this suffix are skipped
    #[serde(default)]
    pub excludes: Option<String>,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Host running the sync agent
    #[serde(default)]
    pub host: Option<String>,

    /// Port (0 = scheme default)
    #[serde(default)]
    pub port: u16,

    /// Use HTTPS
    #[serde(default)]
    pub secure: bool,

    /// Web context the agent is mounted under
    #[serde(default = "default_agent")]
    pub agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_agent() -> String {
    "server".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: None,
            base_dir: default_base_dir(),
            remote: RemoteConfig::default(),
            target: None,
            full: false,
            prune_stale: false,
            includes: None,
            excludes: None,
            log: LogConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 0,
            secure: false,
            agent: default_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Source directory resolved against `base_dir`.
    pub fn resolved_source(&self) -> Option<PathBuf> {
        self.source.as_ref().map(|source| {
            if source.is_absolute() {
                source.clone()
            } else {
                self.base_dir.join(source)
            }
        })
    }

    /// Explicit target, or the host name when none is set.
    pub fn target_dir(&self) -> Option<String> {
        self.target
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.remote.host().map(str::to_string))
    }

    pub fn filter(&self) -> PathFilter {
        PathFilter::new(self.includes.clone(), self.excludes.clone())
    }
}

impl RemoteConfig {
    /// Non-blank host name.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Agent base URL: `{scheme}://{host}[:{port}]/{agent}/`.
    pub fn base_url(&self) -> Result<String, SyncError> {
        let host = self.host().ok_or_else(|| {
            SyncError::Configuration("Host name is missing. Please set remote.host or --host.".into())
        })?;

        let mut url = String::from(if self.secure { "https" } else { "http" });
        url.push_str("://");
        url.push_str(host);
        if self.port != 0 {
            url.push(':');
            url.push_str(&self.port.to_string());
        }
        url.push('/');

        let agent = self.agent.trim_matches('/');
        if !agent.is_empty() {
            url.push_str(agent);
            url.push('/');
        }
        Ok(url)
    }
}

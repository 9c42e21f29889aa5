//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::option_duration_secs;
use super::RetryPolicy;
use crate::error::ConfigError;

/// Configuration for the cleanup daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// IPC port for operator communication (localhost only)
    pub ipc_port: u16,

    /// Directory holding session records and actor state.
    ///
    /// When unset, state lives in memory and is lost on restart.
    pub state_dir: Option<PathBuf>,

    /// Backend control plane
    pub backend: BackendConfig,

    /// Retry policy for failed cleanups
    pub retry: RetryPolicy,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            ipc_port: 22240,
            state_dir: Some(super::default_config_dir().join("state")),
            backend: BackendConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DaemonConfig {
    /// Get the IPC address (localhost:port)
    pub fn ipc_address(&self) -> String {
        format!("127.0.0.1:{}", self.ipc_port)
    }
}

/// Backend control plane endpoint and credential
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://labs.example.com`
    pub url: Option<String>,

    /// Bearer token attached to every request
    pub token: Option<String>,

    /// Per-request timeout; unset means wait indefinitely
    #[serde(with = "option_duration_secs")]
    pub request_timeout: Option<Duration>,
}

impl BackendConfig {
    /// Base URL without trailing slashes, or an error if it is missing
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        match self.url.as_deref().map(|u| u.trim().trim_end_matches('/')) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(ConfigError::MissingField("backend.url".to_string())),
        }
    }

    /// Bearer token, or an error if it is missing
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingField("backend.token".to_string())),
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

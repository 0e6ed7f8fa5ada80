// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Ambient configuration loading (§6 "Configuration knobs").
//!
//! The specification leaves `config.py` opaque; this crate gives it a
//! concrete, serde-driven shape loaded from YAML, the way the teacher
//! loads `.conflow.yaml` via `Pipeline::from_file`/`from_yaml`.

use crate::error::{PenchyError, PenchyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_uploads() -> Vec<String> {
    Vec::new()
}

/// Server-side configuration (§6 `SERVER_HOST`, `SERVER_PORT`), plus
/// the ambient knobs `original_source/penchy/server.py` hardcodes
/// (`self.server.timeout = 2`, the fixed upload tuple) made
/// configurable instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_host: String,
    pub server_port: u16,

    /// How often the result loop polls `received_all_results`/
    /// `nodes_timed_out` (§4.8 "RPC timeout ≈ 2s").
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Extra files uploaded to every node alongside the job source,
    /// bootstrap script, and config file (§4.8 Launch).
    #[serde(default = "default_uploads")]
    pub uploads: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 16000,
            poll_interval_ms: default_poll_interval_ms(),
            uploads: default_uploads(),
        }
    }
}

impl ServerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_yaml(contents: &str) -> PenchyResult<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> PenchyResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| PenchyError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&contents)
    }
}

/// The client-side counterpart of `config.py` (§6): the host/port the
/// bootstrap reports results to, loaded the same way as
/// [`ServerConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
}

impl ClientConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    pub fn from_yaml(contents: &str) -> PenchyResult<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> PenchyResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| PenchyError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_bootstrap_contract() {
        let config = ServerConfig::default();
        assert_eq!(config.poll_interval_ms, 2_000);
    }

    #[test]
    fn loads_from_yaml() {
        let yaml = "server_host: 10.0.0.1\nserver_port: 17000\npoll_interval_ms: 500\n";
        let config = ServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server_host, "10.0.0.1");
        assert_eq!(config.server_port, 17000);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ServerConfig::from_yaml_file("/nonexistent/penchy-config.yaml").unwrap_err();
        assert!(matches!(err, PenchyError::FileReadError { .. }));
    }

    #[test]
    fn client_config_builds_a_base_url() {
        let config = ClientConfig::from_yaml("server_host: 10.0.0.1\nserver_port: 16000\n").unwrap();
        assert_eq!(config.base_url(), "http://10.0.0.1:16000");
    }
}

//! Proxy Configuration
//!
//! Loaded from an optional YAML file; every field has a default so a file
//! only needs the values it changes. Command line flags override the file.

use crate::controlplane::backends::EndpointConfig;
use crate::controlplane::orchestrator::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::hardware::discovery::{ResolverConfig, ScannerConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Top-level configuration of the proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    /// REST API bind address
    pub listen_addr: String,
    /// Downstream volume backend
    pub backend_endpoint: String,
    /// Offload processor; absent disables offload attach
    pub offload_endpoint: Option<String>,
    pub orchestrator: OrchestratorConfig,
    pub scanner: ScannerConfig,
    pub resolver: ResolverConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8090".to_string(),
            backend_endpoint: String::new(),
            offload_endpoint: None,
            orchestrator: OrchestratorConfig::default(),
            scanner: ScannerConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Reject configurations the proxy cannot run with
    pub fn validate(&self) -> Result<()> {
        let orch = &self.orchestrator;
        if orch.driver_name.is_empty() {
            return Err(Error::Configuration("driver name is required".into()));
        }
        if orch.driver_version.is_empty() {
            return Err(Error::Configuration("driver version is required".into()));
        }
        if orch.node_id.is_empty() {
            return Err(Error::Configuration("node id is required".into()));
        }
        if self.backend_endpoint.trim().is_empty() {
            return Err(Error::Configuration("backend endpoint is required".into()));
        }
        if self.offload_endpoint.is_some() && orch.controller_id.is_empty() {
            return Err(Error::Configuration(
                "controller id is required when an offload endpoint is set".into(),
            ));
        }
        if orch.call_timeout_ms == 0 {
            return Err(Error::Configuration("call timeout must be positive".into()));
        }
        if orch.mount.max_attempts == 0 {
            return Err(Error::Configuration("mount attempts must be positive".into()));
        }
        if self.resolver.poll_interval_ms == 0 || self.resolver.max_wait_ms == 0 {
            return Err(Error::Configuration(
                "resolver poll interval and max wait must be positive".into(),
            ));
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            Error::Configuration(format!("invalid listen address {}: {}", self.listen_addr, e))
        })
    }

    pub fn backend(&self) -> EndpointConfig {
        EndpointConfig {
            base_url: self.backend_endpoint.clone(),
        }
    }

    /// Offload endpoint, treating an empty string as unset
    pub fn offload(&self) -> Option<EndpointConfig> {
        self.offload_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| EndpointConfig {
                base_url: s.to_string(),
            })
    }
}

//! Volume Backend Client
//!
//! Forwards node, identity, and controller calls to the downstream volume
//! plugin that owns the volumes.

use super::{EndpointConfig, JsonEndpoint};
use crate::domain::ports::{
    CreateVolumeRequest, CreatedVolume, PluginCapabilities, PluginInfo, ProbeResult,
    UnpublishRequest, VolumeBackend, VolumeRequest,
};
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// HTTP client for the downstream volume backend
#[derive(Debug, Clone)]
pub struct HttpVolumeBackend {
    endpoint: JsonEndpoint,
}

impl HttpVolumeBackend {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let endpoint = JsonEndpoint::new("backend", config)?;
        info!("Volume backend at {}", endpoint.base_url());
        Ok(Self { endpoint })
    }
}

#[async_trait]
impl VolumeBackend for HttpVolumeBackend {
    async fn node_publish(&self, request: &VolumeRequest) -> Result<()> {
        self.endpoint.post_unit("/v1/node/publish", request).await
    }

    async fn node_unpublish(&self, request: &UnpublishRequest) -> Result<()> {
        self.endpoint.post_unit("/v1/node/unpublish", request).await
    }

    async fn plugin_info(&self) -> Result<PluginInfo> {
        self.endpoint.get("/v1/identity/info").await
    }

    async fn probe(&self) -> Result<ProbeResult> {
        self.endpoint.get("/v1/identity/probe").await
    }

    async fn plugin_capabilities(&self) -> Result<PluginCapabilities> {
        self.endpoint.get("/v1/identity/capabilities").await
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<CreatedVolume> {
        self.endpoint.post("/v1/controller/volumes", request).await
    }
}

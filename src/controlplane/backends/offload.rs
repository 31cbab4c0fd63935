//! Offload Processor Client
//!
//! Asks the offload processor (DPU) to expose or withdraw a volume as an
//! NVMe namespace on the emulated host controller.

use super::{EndpointConfig, JsonEndpoint};
use crate::domain::ports::{OffloadInfo, OffloadProcessor};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Attach request on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffloadAttachRequest {
    /// Volume UUID
    pub volume_id: String,
    pub controller_id: String,
    pub target_path: String,
    #[serde(default)]
    pub volume_context: BTreeMap<String, String>,
}

/// Detach request on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffloadDetachRequest {
    /// Namespace id of the attached volume
    pub volume_id: String,
    pub target_path: String,
}

/// HTTP client for the offload processor
#[derive(Debug, Clone)]
pub struct HttpOffloadClient {
    endpoint: JsonEndpoint,
}

impl HttpOffloadClient {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let endpoint = JsonEndpoint::new("offload", config)?;
        info!("Offload processor at {}", endpoint.base_url());
        Ok(Self { endpoint })
    }
}

#[async_trait]
impl OffloadProcessor for HttpOffloadClient {
    async fn attach(
        &self,
        volume_uuid: &str,
        controller_id: &str,
        target_path: &str,
        volume_context: &BTreeMap<String, String>,
    ) -> Result<()> {
        let request = OffloadAttachRequest {
            volume_id: volume_uuid.to_string(),
            controller_id: controller_id.to_string(),
            target_path: target_path.to_string(),
            volume_context: volume_context.clone(),
        };
        self.endpoint.post_unit("/v1/offload/attach", &request).await
    }

    async fn detach(&self, nsid: &str, target_path: &str) -> Result<()> {
        let request = OffloadDetachRequest {
            volume_id: nsid.to_string(),
            target_path: target_path.to_string(),
        };
        self.endpoint.post_unit("/v1/offload/detach", &request).await
    }

    async fn info(&self) -> Result<OffloadInfo> {
        self.endpoint.get("/v1/offload/info").await
    }
}

//! Domain Ports - Core types and trait definitions for the attach proxy
//!
//! These traits define the boundaries between the orchestration logic and
//! the external systems it drives: the downstream volume backend, the
//! optional offload processor, and the host mount table.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// Volume Capability
// =============================================================================

/// How a volume may be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMode {
    SingleNodeWriter,
    SingleNodeReaderOnly,
    MultiNodeReaderOnly,
    MultiNodeSingleWriter,
    MultiNodeMultiWriter,
}

/// Whether the volume is consumed as a filesystem or a raw block device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessType {
    #[serde(rename_all = "camelCase")]
    Mount {
        /// Filesystem type; empty lets the host detect it
        #[serde(default)]
        fs_type: String,
        #[serde(default)]
        mount_flags: Vec<String>,
    },
    Block,
}

/// Capability requested for a volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeCapability {
    pub access_mode: Option<AccessMode>,
    pub access_type: Option<AccessType>,
}

impl VolumeCapability {
    /// Filesystem mount capability with the given access mode
    pub fn mount(access_mode: AccessMode) -> Self {
        Self {
            access_mode: Some(access_mode),
            access_type: Some(AccessType::Mount {
                fs_type: String::new(),
                mount_flags: Vec::new(),
            }),
        }
    }

    /// Filesystem type requested, if any
    pub fn fs_type(&self) -> Option<&str> {
        match &self.access_type {
            Some(AccessType::Mount { fs_type, .. }) if !fs_type.is_empty() => Some(fs_type),
            _ => None,
        }
    }

    /// Mount flags requested, if any
    pub fn mount_flags(&self) -> &[String] {
        match &self.access_type {
            Some(AccessType::Mount { mount_flags, .. }) => mount_flags,
            _ => &[],
        }
    }
}

// =============================================================================
// Node Requests
// =============================================================================

/// Request to make a volume available at a target path on this node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    /// Opaque volume identifier embedding a UUID
    pub volume_id: String,
    /// Path the volume is mounted at
    pub target_path: String,
    #[serde(default)]
    pub staging_target_path: Option<String>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub volume_capability: Option<VolumeCapability>,
    #[serde(default)]
    pub volume_context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
}

/// Request to remove a volume from a target path on this node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpublishRequest {
    pub volume_id: String,
    pub target_path: String,
}

/// Request for usage statistics of a published volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStatsRequest {
    pub volume_id: String,
    pub volume_path: String,
}

/// Volume usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStats {
    #[serde(default)]
    pub usage: Vec<VolumeUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeUsage {
    pub available: u64,
    pub total: u64,
    pub used: u64,
    pub unit: String,
}

/// Identity of the node this proxy runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: String,
}

// =============================================================================
// Identity / Controller Types
// =============================================================================

/// Plugin identity reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub name: String,
    pub vendor_version: String,
    #[serde(default)]
    pub manifest: BTreeMap<String, String>,
}

/// Result of a readiness probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub ready: bool,
}

/// Capabilities advertised by the backend plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginCapabilities {
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Request to create a volume in the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeRequest {
    pub name: String,
    #[serde(default)]
    pub capacity_bytes: u64,
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Volume created by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedVolume {
    pub volume_id: String,
    #[serde(default)]
    pub capacity_bytes: u64,
    #[serde(default)]
    pub volume_context: BTreeMap<String, String>,
}

// =============================================================================
// Host Device Types
// =============================================================================

/// One namespace exposed by an eligible storage controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRecord {
    /// Canonical lowercase UUID, empty when absent or malformed
    pub uuid: String,
    /// Namespace id as read from the host
    pub nsid: String,
    /// Block device path, e.g. `/dev/nvme0n1`
    pub dev_path: String,
}

// =============================================================================
// Offload Processor Types
// =============================================================================

/// Offload processor description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffloadInfo {
    pub dpu_type: String,
}

// =============================================================================
// Ports
// =============================================================================

/// Downstream volume backend that owns publish/unpublish semantics
#[async_trait]
pub trait VolumeBackend: Send + Sync {
    /// Forward a node publish
    async fn node_publish(&self, request: &VolumeRequest) -> Result<()>;

    /// Forward a node unpublish
    async fn node_unpublish(&self, request: &UnpublishRequest) -> Result<()>;

    async fn plugin_info(&self) -> Result<PluginInfo>;

    async fn probe(&self) -> Result<ProbeResult>;

    async fn plugin_capabilities(&self) -> Result<PluginCapabilities>;

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<CreatedVolume>;
}

/// Offload processor attaching volumes on behalf of the host
#[async_trait]
pub trait OffloadProcessor: Send + Sync {
    /// Expose the volume identified by `volume_uuid` on `controller_id`
    async fn attach(
        &self,
        volume_uuid: &str,
        controller_id: &str,
        target_path: &str,
        volume_context: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Withdraw the namespace `nsid`
    async fn detach(&self, nsid: &str, target_path: &str) -> Result<()>;

    async fn info(&self) -> Result<OffloadInfo>;
}

/// Host mount table
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Whether `path` is an active mount point.
    ///
    /// Returns an error of kind [`std::io::ErrorKind::NotFound`] when the
    /// path does not exist.
    async fn is_mount_point(&self, path: &Path) -> std::io::Result<bool>;

    /// Mount `source` at `target`
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: Option<&str>,
        options: &[String],
    ) -> Result<()>;

    /// Unmount `target` and remove the mount point directory
    async fn cleanup_mount_point(&self, target: &Path) -> Result<()>;
}

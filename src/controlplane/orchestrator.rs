//! Volume Orchestrator
//!
//! Owns the collaborators every node, identity, and controller operation
//! needs:
//! - The downstream volume backend
//! - The optional offload processor
//! - The host mount table
//! - The device resolver over the namespace scanner
//! - The per-volume lock table
//!
//! The attach and detach sequences live in `attach.rs` and `detach.rs`;
//! the pass-through operations in `identity.rs`, `node.rs`, and
//! `controller.rs`.

use crate::controlplane::backends::{HttpOffloadClient, HttpVolumeBackend};
use crate::controlplane::locks::VolumeLocks;
use crate::domain::ports::{Mounter, OffloadProcessor, VolumeBackend};
use crate::error::{Error, Result};
use crate::hardware::discovery::{DeviceResolver, NamespaceScanner};
use crate::hardware::mount::HostMounter;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Logical controller the offload processor exposes namespaces on
pub const DEFAULT_CONTROLLER_ID: &str = "NvmeEmu0pf0";

// =============================================================================
// Orchestrator Configuration
// =============================================================================

/// Mount retry and mount point settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MountConfig {
    /// Total mount attempts before giving up
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_interval_ms: u64,
    /// Permission bits for a freshly created target directory
    pub dir_mode: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            retry_interval_ms: 100,
            dir_mode: 0o777,
        }
    }
}

impl MountConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    /// Driver name reported by identity calls
    pub driver_name: String,
    /// Driver version reported by identity calls
    pub driver_version: String,
    /// Node this proxy runs on
    pub node_id: String,
    /// Offload controller namespaces are attached to
    pub controller_id: String,
    /// Deadline for each backend / offload call in milliseconds
    pub call_timeout_ms: u64,
    pub mount: MountConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            driver_name: String::new(),
            driver_version: String::new(),
            node_id: String::new(),
            controller_id: DEFAULT_CONTROLLER_ID.to_string(),
            call_timeout_ms: 10_000,
            mount: MountConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Orchestrator as wired by the binary
pub type HostOrchestrator = VolumeOrchestrator<HttpVolumeBackend, HttpOffloadClient, HostMounter>;

/// Coordinates backend, offload processor, host devices, and mounts
pub struct VolumeOrchestrator<B, O, M> {
    pub(crate) config: OrchestratorConfig,
    pub(crate) backend: B,
    /// Present only when an offload processor is configured
    pub(crate) offload: Option<O>,
    pub(crate) mounter: M,
    pub(crate) resolver: DeviceResolver,
    pub(crate) locks: VolumeLocks,
}

impl<B, O, M> VolumeOrchestrator<B, O, M>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    /// Create a new orchestrator
    pub fn new(
        config: OrchestratorConfig,
        backend: B,
        offload: Option<O>,
        mounter: M,
        resolver: DeviceResolver,
    ) -> Self {
        if offload.is_some() {
            info!(controller_id = %config.controller_id, "Offload processor enabled");
        } else {
            info!("No offload processor configured; using host attach path only");
        }

        Self {
            config,
            backend,
            offload,
            mounter,
            resolver,
            locks: VolumeLocks::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn has_offload(&self) -> bool {
        self.offload.is_some()
    }

    pub fn scanner(&self) -> &NamespaceScanner {
        self.resolver.scanner()
    }

    /// Number of volumes with an operation in flight
    pub fn volumes_in_flight(&self) -> usize {
        self.locks.len()
    }

    /// Run one outbound call under the per-call deadline
    pub(crate) async fn call<T, F>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(operation, self.config.call_timeout(), cancel, fut).await
    }
}

/// Await `fut` unless `timeout` elapses or `cancel` fires first
pub(crate) async fn with_deadline<T, F>(
    operation: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled {
            operation: operation.to_string(),
        }),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, ?timeout, "Call exceeded its deadline");
                Err(Error::DeadlineExceeded {
                    operation: operation.to_string(),
                    timeout,
                })
            }
        },
    }
}

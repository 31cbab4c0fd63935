//! Mock collaborators for orchestrator tests
//!
//! All mocks append to one shared [`CallLog`] so tests can assert on the
//! order of side effects across the backend, offload processor, and mounts.

use crate::controlplane::orchestrator::{MountConfig, OrchestratorConfig, VolumeOrchestrator};
use crate::domain::ports::{
    AccessMode, CreateVolumeRequest, CreatedVolume, Mounter, OffloadInfo, OffloadProcessor,
    PluginCapabilities, PluginInfo, ProbeResult, UnpublishRequest, VolumeBackend,
    VolumeCapability, VolumeRequest,
};
use crate::error::{Error, ErrorCode, Result};
use crate::hardware::discovery::scanner::fixtures::scanner_for;
use crate::hardware::discovery::{DeviceResolver, ResolverConfig};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) type TestOrchestrator = VolumeOrchestrator<MockBackend, MockOffload, MockMounter>;

pub(crate) const UUID: &str = "11111111-2222-3333-4444-555555555555";
pub(crate) const VOLUME_ID: &str = "pvc-11111111-2222-3333-4444-555555555555";

/// Ordered record of collaborator calls
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub(crate) fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

fn downstream(service: &str, code: ErrorCode) -> Error {
    Error::Downstream {
        service: service.to_string(),
        code,
        message: format!("{} rejected the call", service),
    }
}

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct MockBackend {
    log: CallLog,
    pub(crate) fail_with: Option<ErrorCode>,
    pub(crate) delay: Option<Duration>,
}

impl MockBackend {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    async fn respond(&self, call: &str) -> Result<()> {
        self.log.push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.fail_with {
            Some(code) => Err(downstream("backend", code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VolumeBackend for MockBackend {
    async fn node_publish(&self, _request: &VolumeRequest) -> Result<()> {
        self.respond("backend.publish").await
    }

    async fn node_unpublish(&self, _request: &UnpublishRequest) -> Result<()> {
        self.respond("backend.unpublish").await
    }

    async fn plugin_info(&self) -> Result<PluginInfo> {
        self.respond("backend.info").await?;
        Ok(PluginInfo {
            name: "nvme.backend.io".into(),
            vendor_version: "1.4.0".into(),
            manifest: BTreeMap::new(),
        })
    }

    async fn probe(&self) -> Result<ProbeResult> {
        self.respond("backend.probe").await?;
        Ok(ProbeResult { ready: true })
    }

    async fn plugin_capabilities(&self) -> Result<PluginCapabilities> {
        self.respond("backend.capabilities").await?;
        Ok(PluginCapabilities {
            capabilities: vec!["CONTROLLER_SERVICE".into()],
        })
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<CreatedVolume> {
        self.respond("backend.create").await?;
        Ok(CreatedVolume {
            volume_id: format!("pvc-{}", UUID),
            capacity_bytes: request.capacity_bytes,
            volume_context: BTreeMap::new(),
        })
    }
}

// =============================================================================
// Offload Processor
// =============================================================================

type AttachHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub(crate) struct MockOffload {
    log: CallLog,
    pub(crate) fail_with: Option<ErrorCode>,
    /// Runs after a successful attach, e.g. to make the namespace appear
    pub(crate) on_attach: Option<AttachHook>,
}

impl MockOffload {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    fn result(&self) -> Result<()> {
        match self.fail_with {
            Some(code) => Err(downstream("offload", code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl OffloadProcessor for MockOffload {
    async fn attach(
        &self,
        volume_uuid: &str,
        controller_id: &str,
        _target_path: &str,
        _volume_context: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.log
            .push(format!("offload.attach:{}@{}", volume_uuid, controller_id));
        self.result()?;
        if let Some(hook) = &self.on_attach {
            hook();
        }
        Ok(())
    }

    async fn detach(&self, nsid: &str, _target_path: &str) -> Result<()> {
        self.log.push(format!("offload.detach:{}", nsid));
        self.result()
    }

    async fn info(&self) -> Result<OffloadInfo> {
        self.log.push("offload.info");
        self.result()?;
        Ok(OffloadInfo {
            dpu_type: "bluefield".into(),
        })
    }
}

// =============================================================================
// Mounter
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct MockMounter {
    log: CallLog,
    mounted: Mutex<HashSet<PathBuf>>,
    failures_left: AtomicU32,
    options_seen: Mutex<Vec<Vec<String>>>,
}

impl MockMounter {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    /// Fail the next `n` mount calls
    pub(crate) fn failing(log: &CallLog, n: u32) -> Self {
        let mounter = Self::new(log);
        mounter.failures_left.store(n, Ordering::SeqCst);
        mounter
    }

    pub(crate) fn is_mounted(&self, path: &Path) -> bool {
        self.mounted.lock().unwrap().contains(path)
    }

    pub(crate) fn last_options(&self) -> Option<Vec<String>> {
        self.options_seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mounter for MockMounter {
    async fn is_mount_point(&self, path: &Path) -> std::io::Result<bool> {
        tokio::fs::metadata(path).await?;
        Ok(self.is_mounted(path))
    }

    async fn mount(
        &self,
        source: &str,
        target: &Path,
        _fs_type: Option<&str>,
        options: &[String],
    ) -> Result<()> {
        self.log.push(format!("mount:{}", source));
        self.options_seen.lock().unwrap().push(options.to_vec());

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(Error::Internal(format!("{} is busy", source)));
        }

        self.mounted.lock().unwrap().insert(target.to_path_buf());
        Ok(())
    }

    async fn cleanup_mount_point(&self, target: &Path) -> Result<()> {
        self.log.push("unmount");
        self.mounted.lock().unwrap().remove(target);
        let _ = tokio::fs::remove_dir(target).await;
        Ok(())
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Orchestrator config with short retry intervals
pub(crate) fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        driver_name: "nvme.proxy.io".into(),
        driver_version: "0.1.0".into(),
        node_id: "worker-1".into(),
        mount: MountConfig {
            retry_interval_ms: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub(crate) fn orchestrator(
    sysfs: &Path,
    config: OrchestratorConfig,
    backend: MockBackend,
    offload: Option<MockOffload>,
    mounter: MockMounter,
) -> TestOrchestrator {
    let resolver = DeviceResolver::new(
        scanner_for(sysfs),
        ResolverConfig {
            poll_interval_ms: 5,
            max_wait_ms: 200,
        },
    );
    VolumeOrchestrator::new(config, backend, offload, mounter, resolver)
}

pub(crate) fn publish_request(target: &Path) -> VolumeRequest {
    VolumeRequest {
        volume_id: VOLUME_ID.into(),
        target_path: target.display().to_string(),
        volume_capability: Some(VolumeCapability::mount(AccessMode::SingleNodeWriter)),
        ..Default::default()
    }
}

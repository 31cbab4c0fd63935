//! Attach Orchestrator
//!
//! Makes a volume available at a target path:
//! 1. Validate the request
//! 2. Forward the publish to the volume backend
//! 3. Attach through the offload processor, when one is configured
//! 4. Resolve the block device of the volume's namespace
//! 5. Prepare the target directory
//! 6. Return early if the target is already mounted
//! 7. Mount, retrying while the device settles
//!
//! Failures after step 1 are not rolled back. Re-issuing the publish is the
//! recovery path, and step 6 makes that safe.

use crate::controlplane::orchestrator::VolumeOrchestrator;
use crate::domain::ports::{Mounter, OffloadProcessor, VolumeBackend, VolumeRequest};
use crate::error::{Error, Result};
use crate::hardware::discovery::extract_volume_uuid;
use crate::metrics;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Per-call state of one publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSession {
    pub volume_id: String,
    /// UUID embedded in the volume id
    pub uuid: String,
    pub device_path: String,
    pub fs_type: Option<String>,
    pub mount_options: Vec<String>,
    /// Mount calls issued; zero when the target was already mounted
    pub mount_attempts: u32,
}

impl AttachmentSession {
    pub fn already_mounted(&self) -> bool {
        self.mount_attempts == 0
    }
}

impl<B, O, M> VolumeOrchestrator<B, O, M>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    /// Publish a volume at its target path
    #[instrument(
        skip(self, request, cancel),
        fields(volume_id = %request.volume_id, target_path = %request.target_path)
    )]
    pub async fn publish(
        &self,
        request: &VolumeRequest,
        cancel: &CancellationToken,
    ) -> Result<AttachmentSession> {
        let result = self.publish_exclusive(request, cancel).await;
        metrics::PUBLISH_TOTAL
            .with_label_values(&[&metrics::outcome(&result)])
            .inc();

        match &result {
            Ok(session) => info!(
                device = %session.device_path,
                attempts = session.mount_attempts,
                "Volume published"
            ),
            Err(e) => error!(
                error = %e,
                code = %e.code(),
                retryable = e.is_retryable(),
                "Volume publish failed"
            ),
        }
        result
    }

    async fn publish_exclusive(
        &self,
        request: &VolumeRequest,
        cancel: &CancellationToken,
    ) -> Result<AttachmentSession> {
        validate_publish(request)?;
        let _guard = self.locks.acquire(&request.volume_id, cancel).await?;

        self.call("backend node_publish", cancel, self.backend.node_publish(request))
            .await?;
        debug!("Backend publish complete");

        if let Some(offload) = &self.offload {
            let uuid = extract_volume_uuid(&request.volume_id)
                .ok_or_else(|| Error::Internal("no UUID found in volume id".into()))?;
            info!(uuid = %uuid, controller_id = %self.config.controller_id, "Requesting offload attach");
            self.call(
                "offload attach",
                cancel,
                offload.attach(
                    &uuid,
                    &self.config.controller_id,
                    &request.target_path,
                    &request.volume_context,
                ),
            )
            .await?;
        }

        let device_path = self.resolver.resolve(&request.volume_id, cancel).await?;
        let uuid = extract_volume_uuid(&request.volume_id).unwrap_or_default();

        let capability = request.volume_capability.as_ref();
        let fs_type = capability.and_then(|c| c.fs_type()).map(str::to_string);
        let mut mount_options: Vec<String> = capability
            .map(|c| c.mount_flags().to_vec())
            .unwrap_or_default();
        if request.readonly {
            mount_options.push("ro".to_string());
        }

        let mut session = AttachmentSession {
            volume_id: request.volume_id.clone(),
            uuid,
            device_path,
            fs_type,
            mount_options,
            mount_attempts: 0,
        };

        let target = Path::new(&request.target_path);
        if self.prepare_target(target).await? {
            info!("Target already mounted");
            return Ok(session);
        }

        session.mount_attempts = self.mount_with_retry(&session, target, cancel).await?;
        Ok(session)
    }

    /// Report whether `target` is mounted, creating it when missing
    async fn prepare_target(&self, target: &Path) -> Result<bool> {
        match self.mounter.is_mount_point(target).await {
            Ok(mounted) => Ok(mounted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mode = self.config.mount.dir_mode;
                debug!(path = %target.display(), mode = %format!("{:o}", mode), "Creating target directory");
                tokio::fs::create_dir_all(target).await.map_err(|e| {
                    Error::Internal(format!("create {}: {}", target.display(), e))
                })?;
                tokio::fs::set_permissions(target, std::fs::Permissions::from_mode(mode))
                    .await
                    .map_err(|e| Error::Internal(format!("chmod {}: {}", target.display(), e)))?;
                Ok(false)
            }
            Err(e) => Err(Error::Internal(format!(
                "stat {}: {}",
                target.display(),
                e
            ))),
        }
    }

    /// Mount the session's device, returning the attempt that succeeded
    async fn mount_with_retry(
        &self,
        session: &AttachmentSession,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        let max_attempts = self.config.mount.max_attempts.max(1);
        let interval = self.config.mount.retry_interval();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            metrics::MOUNT_ATTEMPTS.inc();
            match self
                .mounter
                .mount(
                    &session.device_path,
                    target,
                    session.fs_type.as_deref(),
                    &session.mount_options,
                )
                .await
            {
                Ok(()) => {
                    if attempt > 1 {
                        info!(attempt, "Mount succeeded after retry");
                    }
                    return Ok(attempt);
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Mount attempt failed");
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(Error::Cancelled {
                            operation: format!("mount of {}", session.device_path),
                        });
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        warn!(attempts = max_attempts, error = %last_error, "Mount retries exhausted");
        Err(Error::MountFailed {
            source_path: session.device_path.clone(),
            target: target.display().to_string(),
            attempts: max_attempts,
            reason: last_error,
        })
    }
}

fn validate_publish(request: &VolumeRequest) -> Result<()> {
    if request.volume_id.is_empty() {
        return Err(Error::InvalidArgument("Volume ID missing in request".into()));
    }
    if request.target_path.is_empty() {
        return Err(Error::InvalidArgument("Target path not provided".into()));
    }
    match &request.volume_capability {
        Some(capability) if capability.access_mode.is_some() || capability.access_type.is_some() => {
            Ok(())
        }
        _ => Err(Error::InvalidArgument(
            "Volume capability missing in request".into(),
        )),
    }
}

//! Detach Orchestrator
//!
//! Removes a volume from a target path. The host unmount always runs before
//! the offload detach and the backend unpublish so the kernel has released
//! the device before it is withdrawn.

use crate::controlplane::orchestrator::VolumeOrchestrator;
use crate::domain::ports::{Mounter, OffloadProcessor, UnpublishRequest, VolumeBackend};
use crate::error::{Error, Result};
use crate::hardware::discovery::extract_volume_uuid;
use crate::metrics;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

impl<B, O, M> VolumeOrchestrator<B, O, M>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    /// Unpublish a volume from its target path
    #[instrument(
        skip(self, request, cancel),
        fields(volume_id = %request.volume_id, target_path = %request.target_path)
    )]
    pub async fn unpublish(
        &self,
        request: &UnpublishRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let result = self.unpublish_exclusive(request, cancel).await;
        metrics::UNPUBLISH_TOTAL
            .with_label_values(&[&metrics::outcome(&result)])
            .inc();

        match &result {
            Ok(()) => info!("Volume unpublished"),
            Err(e) => error!(
                error = %e,
                code = %e.code(),
                retryable = e.is_retryable(),
                "Volume unpublish failed"
            ),
        }
        result
    }

    async fn unpublish_exclusive(
        &self,
        request: &UnpublishRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if request.volume_id.is_empty() {
            return Err(Error::InvalidArgument("Volume ID missing in request".into()));
        }
        if request.target_path.is_empty() {
            return Err(Error::InvalidArgument("Target path missing in request".into()));
        }
        let _guard = self.locks.acquire(&request.volume_id, cancel).await?;

        let target = Path::new(&request.target_path);
        match self.mounter.is_mount_point(target).await {
            Ok(true) => {}
            Ok(false) => return Err(Error::NotFound("Volume not mounted".into())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound("Targetpath not found".into()));
            }
            Err(e) => {
                return Err(Error::Internal(format!("stat {}: {}", target.display(), e)));
            }
        }

        info!("Cleaning up mount point");
        self.mounter.cleanup_mount_point(target).await?;

        if let Some(offload) = &self.offload {
            let uuid = extract_volume_uuid(&request.volume_id)
                .ok_or_else(|| Error::Internal("no UUID found in volume id".into()))?;

            match self.scanner().lookup(&uuid).await? {
                Some(namespace) => {
                    info!(uuid = %uuid, nsid = %namespace.nsid, "Requesting offload detach");
                    self.call(
                        "offload detach",
                        cancel,
                        offload.detach(&namespace.nsid, &request.target_path),
                    )
                    .await?;
                }
                None => warn!(uuid = %uuid, "No namespace carries the volume; skipping offload detach"),
            }
        }

        self.call(
            "backend node_unpublish",
            cancel,
            self.backend.node_unpublish(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::testing::*;
    use crate::error::ErrorCode;
    use crate::hardware::discovery::scanner::fixtures::add_controller;
    use crate::hardware::discovery::SNAP_CONTROLLER_MODEL;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn unpublish_request(target: &Path) -> UnpublishRequest {
        UnpublishRequest {
            volume_id: VOLUME_ID.into(),
            target_path: target.display().to_string(),
        }
    }

    #[tokio::test]
    async fn test_validation() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            None,
            MockMounter::new(&log),
        );
        let cancel = CancellationToken::new();

        let err = orch
            .unpublish(
                &UnpublishRequest {
                    volume_id: String::new(),
                    target_path: "/mnt/t".into(),
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::InvalidArgument(ref m) if m == "Volume ID missing in request");

        let err = orch
            .unpublish(
                &UnpublishRequest {
                    volume_id: VOLUME_ID.into(),
                    target_path: String::new(),
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::InvalidArgument(ref m) if m == "Target path missing in request");
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_never_mounted_target_is_not_found() {
        let sysfs = TempDir::new().unwrap();
        let targets = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            Some(MockOffload::new(&log)),
            MockMounter::new(&log),
        );
        let cancel = CancellationToken::new();

        let missing = targets.path().join("missing");
        let err = orch
            .unpublish(&unpublish_request(&missing), &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, Error::NotFound(ref m) if m == "Targetpath not found");

        let err = orch
            .unpublish(&unpublish_request(targets.path()), &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, Error::NotFound(ref m) if m == "Volume not mounted");

        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unmount_precedes_remote_teardown() {
        let sysfs = TempDir::new().unwrap();
        let targets = TempDir::new().unwrap();
        add_controller(
            sysfs.path(),
            "nvme0",
            SNAP_CONTROLLER_MODEL,
            &[("nvme0n3", "3", UUID)],
        );
        let log = CallLog::default();
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            Some(MockOffload::new(&log)),
            MockMounter::new(&log),
        );
        let cancel = CancellationToken::new();
        let target = targets.path().join("mount");

        orch.publish(&publish_request(&target), &cancel).await.unwrap();
        log.clear();

        orch.unpublish(&unpublish_request(&target), &cancel)
            .await
            .unwrap();

        assert_eq!(
            log.calls(),
            vec![
                "unmount".to_string(),
                "offload.detach:3".to_string(),
                "backend.unpublish".to_string(),
            ]
        );
        assert!(!orch.mounter.is_mounted(&target));
        assert!(!target.exists());

        // A second unpublish is rejected rather than treated as a no-op
        let err = orch
            .unpublish(&unpublish_request(&target), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_missing_namespace_skips_offload_detach() {
        let sysfs = TempDir::new().unwrap();
        let targets = TempDir::new().unwrap();
        add_controller(
            sysfs.path(),
            "nvme0",
            SNAP_CONTROLLER_MODEL,
            &[("nvme0n1", "1", UUID)],
        );
        let log = CallLog::default();
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            Some(MockOffload::new(&log)),
            MockMounter::new(&log),
        );
        let cancel = CancellationToken::new();
        let target = targets.path().join("mount");
        orch.publish(&publish_request(&target), &cancel).await.unwrap();

        std::fs::remove_dir_all(sysfs.path().join("class/nvme/nvme0/nvme0n1")).unwrap();
        log.clear();

        orch.unpublish(&unpublish_request(&target), &cancel)
            .await
            .unwrap();
        assert_eq!(
            log.calls(),
            vec!["unmount".to_string(), "backend.unpublish".to_string()]
        );
    }

    #[tokio::test]
    async fn test_offload_error_stops_before_backend() {
        let sysfs = TempDir::new().unwrap();
        let targets = TempDir::new().unwrap();
        add_controller(
            sysfs.path(),
            "nvme0",
            SNAP_CONTROLLER_MODEL,
            &[("nvme0n1", "1", UUID)],
        );
        let log = CallLog::default();
        let mut offload = MockOffload::new(&log);
        let cancel = CancellationToken::new();
        let target = targets.path().join("mount");

        // Publish without offload, then tear down through a failing one
        let publishing = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            None,
            MockMounter::new(&log),
        );
        publishing
            .publish(&publish_request(&target), &cancel)
            .await
            .unwrap();

        offload.fail_with = Some(ErrorCode::Unavailable);
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            Some(offload),
            publishing.mounter,
        );
        log.clear();

        let err = orch
            .unpublish(&unpublish_request(&target), &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Downstream { code: ErrorCode::Unavailable, .. });
        assert_eq!(
            log.calls(),
            vec!["unmount".to_string(), "offload.detach:1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unpublish_waits_for_publish_of_same_volume() {
        const OTHER_UUID: &str = "99999999-2222-3333-4444-555555555555";

        let sysfs = TempDir::new().unwrap();
        let targets = TempDir::new().unwrap();
        add_controller(
            sysfs.path(),
            "nvme0",
            SNAP_CONTROLLER_MODEL,
            &[("nvme0n1", "1", UUID), ("nvme0n2", "2", OTHER_UUID)],
        );
        let log = CallLog::default();
        let mut backend = MockBackend::new(&log);
        backend.delay = Some(Duration::from_millis(100));
        let orch = Arc::new(orchestrator(
            sysfs.path(),
            test_config(),
            backend,
            None,
            MockMounter::new(&log),
        ));

        let target = targets.path().join("first");
        let publish = {
            let orch = orch.clone();
            let request = publish_request(&target);
            tokio::spawn(async move { orch.publish(&request, &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let unpublish = {
            let orch = orch.clone();
            let request = unpublish_request(&target);
            tokio::spawn(async move { orch.unpublish(&request, &CancellationToken::new()).await })
        };
        let other = {
            let orch = orch.clone();
            let mut request = publish_request(&targets.path().join("second"));
            request.volume_id = format!("pvc-{}", OTHER_UUID);
            tokio::spawn(async move { orch.publish(&request, &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The other volume reached its backend while the first publish still holds its lock
        assert_eq!(log.count("backend.publish"), 2);
        assert_eq!(log.count("unmount"), 0);

        publish.await.unwrap().unwrap();
        unpublish.await.unwrap().unwrap();
        other.await.unwrap().unwrap();

        let calls = log.calls();
        let position = |call: &str| calls.iter().position(|c| c == call).unwrap();
        assert!(position("mount:/dev/nvme0n1") < position("unmount"));
        assert!(position("unmount") < position("backend.unpublish"));
        assert_eq!(log.count("mount:/dev/nvme0n2"), 1);
        assert_eq!(orch.volumes_in_flight(), 0);
    }
}

//! Controller pass-through
//!
//! Volume creation is owned by the backend; this layer only validates
//! before forwarding.

use crate::controlplane::orchestrator::VolumeOrchestrator;
use crate::domain::ports::{
    CreateVolumeRequest, CreatedVolume, Mounter, OffloadProcessor, VolumeBackend,
    VolumeCapability,
};
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl<B, O, M> VolumeOrchestrator<B, O, M>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    pub async fn create_volume(
        &self,
        request: &CreateVolumeRequest,
        cancel: &CancellationToken,
    ) -> Result<CreatedVolume> {
        if request.name.is_empty() {
            return Err(Error::InvalidArgument(
                "CreateVolume name must be provided".into(),
            ));
        }
        validate_capabilities(&request.volume_capabilities)?;

        info!(name = %request.name, capacity_bytes = request.capacity_bytes, "Creating volume");
        self.call(
            "backend create_volume",
            cancel,
            self.backend.create_volume(request),
        )
        .await
    }

    /// Deletion happens in the backend; nothing is held locally
    pub fn delete_volume(&self, volume_id: &str) -> Result<()> {
        if volume_id.is_empty() {
            return Err(Error::InvalidArgument("volume id is empty".into()));
        }
        debug!(volume_id, "Delete acknowledged");
        Ok(())
    }

    /// Every access mode is supported, so present capabilities are confirmed
    pub fn validate_volume_capabilities(
        &self,
        volume_id: &str,
        capabilities: Option<&[VolumeCapability]>,
    ) -> Result<()> {
        if volume_id.is_empty() {
            return Err(Error::InvalidArgument("Volume ID missing in request".into()));
        }
        if capabilities.is_none() {
            return Err(Error::InvalidArgument(
                "Volume capabilities missing in request".into(),
            ));
        }
        Ok(())
    }
}

fn validate_capabilities(capabilities: &[VolumeCapability]) -> Result<()> {
    if capabilities.is_empty() {
        return Err(Error::InvalidArgument(
            "volume capabilities must be provided".into(),
        ));
    }
    for capability in capabilities {
        if capability.access_mode.is_none() {
            return Err(Error::InvalidArgument(
                "volume capability access mode not set".into(),
            ));
        }
        if capability.access_type.is_none() {
            return Err(Error::InvalidArgument(
                "volume capability access type not set".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::testing::*;
    use crate::domain::ports::AccessMode;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_volume_validation() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(sysfs.path(), test_config(), MockBackend::new(&log), None, MockMounter::new(&log));
        let cancel = CancellationToken::new();

        let err = orch
            .create_volume(&CreateVolumeRequest::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "CreateVolume name must be provided");

        let err = orch
            .create_volume(
                &CreateVolumeRequest {
                    name: "data".into(),
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "volume capabilities must be provided");

        let err = orch
            .create_volume(
                &CreateVolumeRequest {
                    name: "data".into(),
                    volume_capabilities: vec![VolumeCapability {
                        access_mode: Some(AccessMode::SingleNodeWriter),
                        access_type: None,
                    }],
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_volume_forwards() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(sysfs.path(), test_config(), MockBackend::new(&log), None, MockMounter::new(&log));

        let created = orch
            .create_volume(
                &CreateVolumeRequest {
                    name: "data".into(),
                    capacity_bytes: 1 << 30,
                    volume_capabilities: vec![VolumeCapability::mount(AccessMode::SingleNodeWriter)],
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(created.capacity_bytes, 1 << 30);
        assert_eq!(log.calls(), vec!["backend.create".to_string()]);
    }

    #[test]
    fn test_delete_and_validate() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(sysfs.path(), test_config(), MockBackend::new(&log), None, MockMounter::new(&log));

        assert!(orch.delete_volume("").is_err());
        orch.delete_volume(VOLUME_ID).unwrap();

        let caps = [VolumeCapability::mount(AccessMode::MultiNodeReaderOnly)];
        assert!(orch.validate_volume_capabilities(VOLUME_ID, None).is_err());
        assert!(orch.validate_volume_capabilities("", Some(&caps[..])).is_err());
        orch.validate_volume_capabilities(VOLUME_ID, Some(&caps[..])).unwrap();
        assert!(log.calls().is_empty());
    }
}

//! Identity pass-through

use crate::controlplane::orchestrator::VolumeOrchestrator;
use crate::domain::ports::{
    Mounter, OffloadProcessor, PluginCapabilities, PluginInfo, ProbeResult, VolumeBackend,
};
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

impl<B, O, M> VolumeOrchestrator<B, O, M>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    /// Plugin identity as reported by the backend.
    ///
    /// When an offload processor is configured it must also answer; its
    /// type is logged but not part of the response.
    pub async fn plugin_info(&self, cancel: &CancellationToken) -> Result<PluginInfo> {
        if self.config.driver_name.is_empty() {
            return Err(Error::Unavailable("Driver name not configured".into()));
        }
        if self.config.driver_version.is_empty() {
            return Err(Error::Unavailable("Driver is missing version".into()));
        }

        let info = self
            .call("backend plugin_info", cancel, self.backend.plugin_info())
            .await?;

        if let Some(offload) = &self.offload {
            let dpu = self
                .call("offload info", cancel, offload.info())
                .await
                .map_err(|e| {
                    error!(error = %e, "Offload processor did not report its info");
                    e
                })?;
            info!(dpu_type = %dpu.dpu_type, "Offload processor");
        }

        Ok(info)
    }

    pub async fn probe(&self, cancel: &CancellationToken) -> Result<ProbeResult> {
        self.call("backend probe", cancel, self.backend.probe()).await
    }

    pub async fn plugin_capabilities(&self, cancel: &CancellationToken) -> Result<PluginCapabilities> {
        self.call(
            "backend plugin_capabilities",
            cancel,
            self.backend.plugin_capabilities(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::testing::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_plugin_info_requires_identity() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let mut config = test_config();
        config.driver_version.clear();
        let orch = orchestrator(sysfs.path(), config, MockBackend::new(&log), None, MockMounter::new(&log));

        let err = orch.plugin_info(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert_eq!(err.to_string(), "Driver is missing version");
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plugin_info_queries_offload() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            Some(MockOffload::new(&log)),
            MockMounter::new(&log),
        );

        let info = orch.plugin_info(&CancellationToken::new()).await.unwrap();
        assert_eq!(info.name, "nvme.backend.io");
        assert_eq!(log.calls(), vec!["backend.info".to_string(), "offload.info".to_string()]);
    }

    #[tokio::test]
    async fn test_plugin_info_offload_failure() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let mut offload = MockOffload::new(&log);
        offload.fail_with = Some(ErrorCode::Unavailable);
        let orch = orchestrator(
            sysfs.path(),
            test_config(),
            MockBackend::new(&log),
            Some(offload),
            MockMounter::new(&log),
        );

        let err = orch.plugin_info(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
    }

    #[tokio::test]
    async fn test_probe_and_capabilities_forward() {
        let sysfs = TempDir::new().unwrap();
        let log = CallLog::default();
        let orch = orchestrator(sysfs.path(), test_config(), MockBackend::new(&log), None, MockMounter::new(&log));
        let cancel = CancellationToken::new();

        assert!(orch.probe(&cancel).await.unwrap().ready);
        let caps = orch.plugin_capabilities(&cancel).await.unwrap();
        assert_eq!(caps.capabilities, vec!["CONTROLLER_SERVICE".to_string()]);
        assert_eq!(
            log.calls(),
            vec!["backend.probe".to_string(), "backend.capabilities".to_string()]
        );
    }
}

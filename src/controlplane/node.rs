//! Node auxiliary operations
//!
//! Staging and expansion are not offered by this proxy; volumes are
//! published directly to their target path.

use crate::controlplane::orchestrator::VolumeOrchestrator;
use crate::domain::ports::{
    Mounter, NodeInfo, OffloadProcessor, VolumeBackend, VolumeStats, VolumeStatsRequest,
};
use crate::error::{Error, Result};

impl<B, O, M> VolumeOrchestrator<B, O, M>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    pub fn node_info(&self) -> NodeInfo {
        NodeInfo {
            node_id: self.config.node_id.clone(),
        }
    }

    /// Node capabilities advertised to callers; none beyond publish
    pub fn node_capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Usage statistics are not collected; a valid request gets an empty report
    pub fn node_volume_stats(&self, request: &VolumeStatsRequest) -> Result<VolumeStats> {
        if request.volume_id.is_empty() {
            return Err(Error::InvalidArgument(
                "NodeGetVolumeStats volume ID was empty".into(),
            ));
        }
        if request.volume_path.is_empty() {
            return Err(Error::InvalidArgument(
                "NodeGetVolumeStats volume path was empty".into(),
            ));
        }
        Ok(VolumeStats::default())
    }

    pub fn node_stage(&self) -> Result<()> {
        Err(Error::Unimplemented("NodeStageVolume".into()))
    }

    pub fn node_unstage(&self) -> Result<()> {
        Err(Error::Unimplemented("NodeUnstageVolume".into()))
    }

    pub fn node_expand(&self) -> Result<()> {
        Err(Error::Unimplemented("NodeExpandVolume".into()))
    }
}

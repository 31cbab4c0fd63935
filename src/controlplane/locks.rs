//! Per-volume mutual exclusion
//!
//! Publish and unpublish of the same volume id are serialised for the whole
//! duration of the call. Calls for distinct volumes never contend.

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Keyed lock table
#[derive(Debug, Default)]
pub struct VolumeLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held for the duration of one call; releases and prunes on drop
#[derive(Debug)]
pub struct VolumeGuard<'a> {
    locks: &'a VolumeLocks,
    volume_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl VolumeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `volume_id`
    pub async fn acquire(&self, volume_id: &str, cancel: &CancellationToken) -> Result<VolumeGuard<'_>> {
        let lock = self
            .locks
            .entry(volume_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(volume_id, "Waiting for in-flight operation on volume");
                let acquired = tokio::select! {
                    _ = cancel.cancelled() => None,
                    guard = lock.clone().lock_owned() => Some(guard),
                };
                match acquired {
                    Some(guard) => guard,
                    None => {
                        drop(lock);
                        self.prune(volume_id);
                        return Err(Error::Cancelled {
                            operation: format!("waiting for lock on {}", volume_id),
                        });
                    }
                }
            }
        };

        Ok(VolumeGuard {
            locks: self,
            volume_id: volume_id.to_string(),
            guard: Some(guard),
        })
    }

    /// Number of volumes with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn prune(&self, volume_id: &str) {
        // Only the map holds the Arc once every guard and waiter is gone
        self.locks
            .remove_if(volume_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Drop for VolumeGuard<'_> {
    fn drop(&mut self) {
        // The guard owns an Arc of its own; release it first
        self.guard.take();
        self.locks.prune(&self.volume_id);
    }
}

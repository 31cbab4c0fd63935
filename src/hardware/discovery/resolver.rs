//! Device Resolver
//!
//! Maps a volume id to the block device of its namespace by polling the
//! namespace scanner. The host offers no hot-plug notification at this
//! layer, so resolution polls at a fixed interval until the namespace
//! appears, the wait bound is exhausted, or the call is cancelled.

use crate::error::{Error, Result};
use crate::hardware::discovery::identity::extract_volume_uuid;
use crate::hardware::discovery::scanner::NamespaceScanner;
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// =============================================================================
// Resolver Configuration
// =============================================================================

/// Polling bounds for device resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Delay between scans in milliseconds
    pub poll_interval_ms: u64,
    /// Upper bound on the total wait in milliseconds
    pub max_wait_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_wait_ms: 30_000,
        }
    }
}

impl ResolverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

// =============================================================================
// Device Resolver
// =============================================================================

/// Resolves volume ids to device paths
#[derive(Debug, Clone)]
pub struct DeviceResolver {
    scanner: NamespaceScanner,
    config: ResolverConfig,
}

impl DeviceResolver {
    pub fn new(scanner: NamespaceScanner, config: ResolverConfig) -> Self {
        Self { scanner, config }
    }

    pub fn scanner(&self) -> &NamespaceScanner {
        &self.scanner
    }

    /// Resolve using the configured poll interval and wait bound
    pub async fn resolve(&self, volume_id: &str, cancel: &CancellationToken) -> Result<String> {
        self.resolve_with(
            volume_id,
            self.config.poll_interval(),
            self.config.max_wait(),
            cancel,
        )
        .await
    }

    /// Resolve the device path of `volume_id`.
    ///
    /// Fails with `InvalidArgument` when no UUID is embedded in the id and
    /// with `DevicePathNotFound` once `max_wait` has elapsed.
    pub async fn resolve_with(
        &self,
        volume_id: &str,
        poll_interval: Duration,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let uuid = extract_volume_uuid(volume_id).ok_or_else(|| {
            Error::InvalidArgument(format!("no UUID found in volume id {}", volume_id))
        })?;

        let started = Instant::now();
        let deadline = started + max_wait;
        let mut polls: u64 = 0;

        loop {
            polls += 1;
            metrics::RESOLVER_POLLS.inc();

            if let Some(ns) = self.scanner.lookup(&uuid).await? {
                info!(
                    uuid = %uuid,
                    nsid = %ns.nsid,
                    dev_path = %ns.dev_path,
                    polls,
                    "Resolved volume device"
                );
                return Ok(ns.dev_path);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::DevicePathNotFound {
                    uuid,
                    waited: now - started,
                });
            }

            debug!(uuid = %uuid, polls, "Namespace not visible yet");

            let sleep_until = std::cmp::min(now + poll_interval, deadline);
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled {
                        operation: format!("device resolution for {}", uuid),
                    });
                }
                _ = tokio::time::sleep_until(sleep_until) => {}
            }
        }
    }
}

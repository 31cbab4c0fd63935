//! Namespace Inventory Scanner
//!
//! Enumerates the namespaces exposed by offload-backed NVMe controllers
//! from sysfs. Every scan reads the host state afresh; nothing is cached.

use crate::domain::ports::NamespaceRecord;
use crate::error::{Error, Result};
use crate::hardware::discovery::identity::is_canonical_uuid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// =============================================================================
// Constants
// =============================================================================

/// Model string reported by controllers emulated by the offload processor
pub const SNAP_CONTROLLER_MODEL: &str = "Mellanox NVMe SNAP Controller";

// =============================================================================
// Scanner Configuration
// =============================================================================

/// Configuration for the namespace scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerConfig {
    /// Path to sysfs (for testing)
    pub sysfs_path: PathBuf,
    /// Directory holding block device nodes
    pub dev_path: PathBuf,
    /// Controller model eligible for scanning
    pub controller_model: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sysfs_path: PathBuf::from("/sys"),
            dev_path: PathBuf::from("/dev"),
            controller_model: SNAP_CONTROLLER_MODEL.to_string(),
        }
    }
}

// =============================================================================
// Namespace Scanner
// =============================================================================

/// Scans sysfs for namespaces of eligible NVMe controllers
#[derive(Debug, Clone)]
pub struct NamespaceScanner {
    config: ScannerConfig,
}

impl NamespaceScanner {
    /// Create a new namespace scanner
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Enumerate every namespace currently exposed by eligible controllers.
    ///
    /// Unreadable attributes degrade to empty strings. A missing controller
    /// directory yields an empty inventory. A UUID seen through more than one
    /// controller path is reported once, by the first controller in name order.
    pub fn scan(&self) -> Vec<NamespaceRecord> {
        let nvme_path = self.config.sysfs_path.join("class/nvme");
        let entries = match fs::read_dir(&nvme_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read NVMe controllers at {}: {}", nvme_path.display(), e);
                return Vec::new();
            }
        };

        let mut controllers: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| (entry.file_name().to_string_lossy().to_string(), entry.path()))
            .collect();
        controllers.sort();

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for (controller_name, controller_path) in controllers {
            let model = read_sysfs_attr(&controller_path, "model");
            debug!(controller = %controller_name, model = %model, "Inspecting NVMe controller");

            if model != self.config.controller_model {
                continue;
            }

            for record in self.scan_controller(&controller_name, &controller_path) {
                if !record.uuid.is_empty() && !seen.insert(record.uuid.clone()) {
                    warn!(
                        uuid = %record.uuid,
                        dev_path = %record.dev_path,
                        "Namespace already reported through another controller; ignoring"
                    );
                    continue;
                }
                records.push(record);
            }
        }

        records
    }

    /// `scan` on the blocking thread pool
    pub async fn inventory(&self) -> Result<Vec<NamespaceRecord>> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .map_err(Error::internal)
    }

    /// `find_by_uuid` on the blocking thread pool
    pub async fn lookup(&self, uuid: &str) -> Result<Option<NamespaceRecord>> {
        let scanner = self.clone();
        let uuid = uuid.to_string();
        tokio::task::spawn_blocking(move || scanner.find_by_uuid(&uuid))
            .await
            .map_err(Error::internal)
    }

    /// Find the namespace carrying `uuid`
    pub fn find_by_uuid(&self, uuid: &str) -> Option<NamespaceRecord> {
        let uuid = uuid.to_ascii_lowercase();
        if uuid.is_empty() {
            return None;
        }
        self.scan().into_iter().find(|ns| ns.uuid == uuid)
    }

    /// Enumerate the namespaces of one eligible controller
    fn scan_controller(&self, controller_name: &str, controller_path: &Path) -> Vec<NamespaceRecord> {
        let pattern = controller_path.join("nvme*");
        let pattern = pattern.to_string_lossy();

        let mut matches: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
            Err(e) => {
                warn!("Invalid namespace pattern {}: {}", pattern, e);
                return Vec::new();
            }
        };
        matches.sort();

        let mut records = Vec::new();
        for ns_path in matches {
            let ns_name = match ns_path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };

            let Some(suffix) = numeric_suffix(&ns_name) else {
                debug!(namespace = %ns_name, "Skipping entry without namespace number");
                continue;
            };

            let nsid = read_sysfs_attr(&ns_path, "nsid");
            let raw_uuid = read_sysfs_attr(&ns_path, "uuid").to_ascii_lowercase();
            let uuid = if is_canonical_uuid(&raw_uuid) {
                raw_uuid
            } else {
                String::new()
            };

            let dev_path = self
                .config
                .dev_path
                .join(format!("{}n{}", controller_name, suffix))
                .to_string_lossy()
                .to_string();

            debug!(nsid = %nsid, uuid = %uuid, dev_path = %dev_path, "Found namespace");

            records.push(NamespaceRecord { uuid, nsid, dev_path });
        }

        records
    }
}

impl Default for NamespaceScanner {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}

/// Read a sysfs attribute, trimmed; empty when unreadable
fn read_sysfs_attr(base_path: &Path, attr: &str) -> String {
    let path = base_path.join(attr);
    match fs::read_to_string(&path) {
        Ok(value) => value.trim().to_string(),
        Err(e) => {
            debug!("Failed to read {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Trailing decimal digits of a device name (nvme0c0n3 -> 3)
fn numeric_suffix(name: &str) -> Option<&str> {
    let digits = name.bytes().rev().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    Some(&name[name.len() - digits..])
}

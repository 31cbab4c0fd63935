//! Host Mount Table
//!
//! Implements the [`Mounter`] port against the running kernel: `mount(8)`
//! for mounting (so the filesystem type can be probed), `umount(2)` for
//! teardown, and `/proc/self/mounts` for mount-point detection.

use crate::domain::ports::Mounter;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Mounter backed by the host kernel
#[derive(Debug, Clone)]
pub struct HostMounter {
    mount_table: PathBuf,
}

impl HostMounter {
    pub fn new() -> Self {
        Self {
            mount_table: PathBuf::from(PROC_MOUNTS),
        }
    }

    /// Use an alternate mount table (for testing)
    pub fn with_mount_table(mount_table: impl Into<PathBuf>) -> Self {
        Self {
            mount_table: mount_table.into(),
        }
    }

    async fn mount_points(&self) -> std::io::Result<Vec<PathBuf>> {
        let contents = tokio::fs::read_to_string(&self.mount_table).await?;
        Ok(parse_mount_points(&contents))
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        let path = target.to_path_buf();
        tokio::task::spawn_blocking(move || nix::mount::umount(&path))
            .await
            .map_err(Error::internal)?
            .map_err(|e| Error::UnmountFailed {
                target: target.display().to_string(),
                reason: e.to_string(),
            })
    }
}

impl Default for HostMounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mounter for HostMounter {
    async fn is_mount_point(&self, path: &Path) -> std::io::Result<bool> {
        // Surfaces NotFound for a missing target before consulting the table
        tokio::fs::metadata(path).await?;

        let wanted = tokio::fs::canonicalize(path).await?;
        Ok(self.mount_points().await?.iter().any(|mp| *mp == wanted))
    }

    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: Option<&str>,
        options: &[String],
    ) -> Result<()> {
        let args = mount_args(source, target, fs_type, options);
        debug!(?args, "Running mount");

        let output = Command::new("mount")
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Internal(format!("failed to run mount: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Internal(format!(
                "mount {} {} failed ({}): {}",
                source,
                target.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn cleanup_mount_point(&self, target: &Path) -> Result<()> {
        let target = match tokio::fs::canonicalize(target).await {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Mount point {} already removed", target.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // Deepest first so submounts are released before their parent
        let mut mounted: Vec<PathBuf> = self
            .mount_points()
            .await?
            .into_iter()
            .filter(|mp| mp.starts_with(&target))
            .collect();
        mounted.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });

        for mount_point in &mounted {
            info!("Unmounting {}", mount_point.display());
            self.unmount(mount_point).await?;
        }

        tokio::fs::remove_dir(&target).await?;
        Ok(())
    }
}

/// Arguments for `mount(8)`
fn mount_args(source: &str, target: &Path, fs_type: Option<&str>, options: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(fs_type) = fs_type {
        args.push("-t".to_string());
        args.push(fs_type.to_string());
    }
    if !options.is_empty() {
        args.push("-o".to_string());
        args.push(options.join(","));
    }
    args.push(source.to_string());
    args.push(target.display().to_string());
    args
}

/// Mount points listed in a `/proc/self/mounts` style table
fn parse_mount_points(contents: &str) -> Vec<PathBuf> {
    // <device> <mountpoint> <fstype> <options> <dump> <pass>
    contents
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|field| PathBuf::from(unescape_octal(field)))
        .collect()
}

/// Decode the `\040`-style escapes used by the kernel in mount tables
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = decoded {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

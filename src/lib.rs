//! Volume Attach Proxy - Node-local volume attachment
//!
//! Sits between a container orchestrator's node agent and a downstream
//! volume backend. Publish requests are forwarded to the backend, optionally
//! attached through an offload processor (DPU) that exposes the volume as an
//! NVMe namespace, resolved to a host block device, and mounted at the
//! requested target path. Unpublish runs the same path in reverse.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                            REST API (axum)                                  │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                          Volume Orchestrator                                │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │     Attach      │  │     Detach      │  │  Identity / Node /          │  │
//! │  │   (publish)     │  │  (unpublish)    │  │  Controller pass-through    │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! │           └────────────────────┼─────────────────────────┘                  │
//! │                    ┌───────────┴───────────┐                                │
//! │                    │  Per-volume locks     │                                │
//! │                    └───────────────────────┘                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │ Volume backend  │  │ Offload proc.   │  │  Host: namespace scanner,   │  │
//! │  │   (HTTP)        │  │ (HTTP, opt.)    │  │  device resolver, mounts    │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: Orchestrator, REST API, and downstream clients
//! - [`hardware`]: Namespace discovery, device resolution, and mounts
//! - [`domain`]: Core domain types and port traits
//! - [`config`]: Proxy configuration
//! - [`metrics`]: Prometheus counters
//! - [`error`]: Error types and handling

pub mod config;
pub mod controlplane;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod metrics;

// Re-export commonly used types
pub use config::ProxyConfig;

pub use controlplane::{
    ApiServer, ApiServerConfig, AttachmentSession, EndpointConfig, HostOrchestrator,
    HttpOffloadClient, HttpVolumeBackend, MountConfig, OrchestratorConfig, RestRouter,
    VolumeLocks, VolumeOrchestrator,
};

pub use domain::ports::{
    AccessMode, AccessType, Mounter, NamespaceRecord, OffloadProcessor, UnpublishRequest,
    VolumeBackend, VolumeCapability, VolumeRequest,
};

pub use error::{Error, ErrorCode, Result};

pub use hardware::{
    extract_volume_uuid, DeviceResolver, HostMounter, NamespaceScanner, ResolverConfig,
    ScannerConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

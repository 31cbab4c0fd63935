//! Volume Attach Proxy
//!
//! Node-local proxy that attaches volumes through an optional offload
//! processor and mounts them at their target paths.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use volume_attach_proxy::{
    ApiServer, ApiServerConfig, DeviceResolver, HostMounter, HostOrchestrator, HttpOffloadClient,
    HttpVolumeBackend, NamespaceScanner, ProxyConfig, Result, VolumeOrchestrator,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Volume Attach Proxy - node publish/unpublish with NVMe offload attach
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// REST API bind address
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Node id reported to callers
    #[arg(long, env = "NODE_ID")]
    node_id: Option<String>,

    /// Driver name reported by identity calls
    #[arg(long, env = "DRIVER_NAME")]
    driver_name: Option<String>,

    /// Driver version reported by identity calls
    #[arg(long, env = "DRIVER_VERSION")]
    driver_version: Option<String>,

    /// Downstream volume backend endpoint
    #[arg(long, env = "BACKEND_ENDPOINT")]
    backend_endpoint: Option<String>,

    /// Offload processor endpoint; unset disables offload attach
    #[arg(long, env = "OFFLOAD_ENDPOINT")]
    offload_endpoint: Option<String>,

    /// Path to sysfs
    #[arg(long, env = "SYSFS_PATH")]
    sysfs_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Load the config file, if any, and apply flag overrides
    fn into_config(self) -> Result<ProxyConfig> {
        let mut config = match &self.config {
            Some(path) => ProxyConfig::from_file(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(node_id) = self.node_id {
            config.orchestrator.node_id = node_id;
        }
        if let Some(name) = self.driver_name {
            config.orchestrator.driver_name = name;
        }
        if let Some(version) = self.driver_version {
            config.orchestrator.driver_version = version;
        }
        if let Some(endpoint) = self.backend_endpoint {
            config.backend_endpoint = endpoint;
        }
        if let Some(endpoint) = self.offload_endpoint {
            config.offload_endpoint = Some(endpoint);
        }
        if let Some(path) = self.sysfs_path {
            config.scanner.sysfs_path = path;
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.log_json);
    let config = args.into_config()?;

    info!("Starting Volume Attach Proxy");
    info!("  Version: {}", volume_attach_proxy::VERSION);
    info!("  Node: {}", config.orchestrator.node_id);
    info!("  REST API: {}", config.listen_addr);
    info!("  Backend: {}", config.backend_endpoint);

    let scanner = NamespaceScanner::new(config.scanner.clone());
    let namespaces = scanner.inventory().await?;
    info!("Found {} offload namespaces", namespaces.len());
    for ns in &namespaces {
        info!("  nsid {} uuid {} at {}", ns.nsid, ns.uuid, ns.dev_path);
    }

    let backend = HttpVolumeBackend::new(&config.backend())?;
    let offload = match config.offload() {
        Some(endpoint) => Some(HttpOffloadClient::new(&endpoint)?),
        None => None,
    };

    let resolver = DeviceResolver::new(scanner, config.resolver.clone());
    let orchestrator: HostOrchestrator = VolumeOrchestrator::new(
        config.orchestrator.clone(),
        backend,
        offload,
        HostMounter::new(),
        resolver,
    );

    let api_config = ApiServerConfig {
        rest_addr: config.listen_addr()?,
    };
    let server = Arc::new(ApiServer::new(api_config, Arc::new(orchestrator)));

    let signal_server = server.clone();
    tokio::spawn(async move {
        signal_server.shutdown_on(tokio::signal::ctrl_c()).await;
    });

    if let Err(e) = server.run().await {
        error!("API server error: {}", e);
        return Err(e);
    }

    info!("Proxy shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(log_level: &str, json: bool) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "tower_http=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

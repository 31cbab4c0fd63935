//! Prometheus metrics
//!
//! Registered in the default registry and exposed by the REST server at
//! `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Publish outcomes by result code
    pub static ref PUBLISH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "volume_attach_proxy_publish_total",
        "Node publish calls by result",
        &["result"]
    )
    .expect("register publish counter");

    /// Unpublish outcomes by result code
    pub static ref UNPUBLISH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "volume_attach_proxy_unpublish_total",
        "Node unpublish calls by result",
        &["result"]
    )
    .expect("register unpublish counter");

    pub static ref MOUNT_ATTEMPTS: IntCounter = register_int_counter!(
        "volume_attach_proxy_mount_attempts_total",
        "Mount attempts issued to the host"
    )
    .expect("register mount counter");

    pub static ref RESOLVER_POLLS: IntCounter = register_int_counter!(
        "volume_attach_proxy_resolver_polls_total",
        "Namespace scans issued while resolving device paths"
    )
    .expect("register resolver counter");
}

/// Label value for an outcome
pub fn outcome<T>(result: &crate::error::Result<T>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(e) => e.code().to_string().to_lowercase(),
    }
}

/// Render the default registry in the text exposition format
pub fn gather_text() -> crate::error::Result<(String, Vec<u8>)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(crate::error::Error::internal)?;
    Ok((encoder.format_type().to_string(), buffer))
}

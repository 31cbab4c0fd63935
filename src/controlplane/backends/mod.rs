//! Downstream Proxy Clients
//!
//! JSON-over-HTTP clients for the collaborators the orchestrators forward to:
//! - Volume backend: publish/unpublish, identity, volume creation
//! - Offload processor: namespace attach/detach

pub mod offload;
pub mod volume_backend;

pub use offload::*;
pub use volume_backend::*;

use crate::error::{Error, ErrorBody, ErrorCode, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Endpoint configuration shared by the proxy clients
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL, e.g. `http://127.0.0.1:9808`
    pub base_url: String,
}

/// Thin JSON transport bound to one remote service
#[derive(Debug, Clone)]
pub(crate) struct JsonEndpoint {
    service: &'static str,
    base_url: String,
    client: Client,
}

impl JsonEndpoint {
    pub(crate) fn new(service: &'static str, config: &EndpointConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("{} client: {}", service, e)))?;

        Ok(Self {
            service,
            base_url,
            client,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(service = self.service, %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        self.decode(response).await
    }

    /// POST discarding any response body
    pub(crate) async fn post_unit<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(service = self.service, %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        self.check(response).await.map(|_| ())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(service = self.service, %url, "GET");
        let response = self.client.get(&url).send().await?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let response = self.check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Turn a non-2xx response into the error the remote reported
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.map(|b| b.to_vec()).map_err(|e| {
            debug!(service = self.service, status = status.as_u16(), "Failed to read error body: {}", e);
            e.to_string()
        });
        let (code, message) = decode_error_body(status.as_u16(), body);

        Err(Error::Downstream {
            service: self.service.to_string(),
            code,
            message,
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Configuration("endpoint must not be empty".into()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{}", trimmed))
    }
}

/// Code and message of a non-2xx response
fn decode_error_body(
    status: u16,
    body: std::result::Result<Vec<u8>, String>,
) -> (ErrorCode, String) {
    match body {
        Ok(bytes) => match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => (body.code, body.message),
            Err(_) => (
                code_for_status(status),
                String::from_utf8_lossy(&bytes).trim().to_string(),
            ),
        },
        Err(e) => (
            code_for_status(status),
            format!("HTTP {} with unreadable body: {}", status, e),
        ),
    }
}

/// Best-effort code for responses without an error body
fn code_for_status(status: u16) -> ErrorCode {
    match status {
        400 => ErrorCode::InvalidArgument,
        404 => ErrorCode::NotFound,
        499 => ErrorCode::Cancelled,
        501 => ErrorCode::Unimplemented,
        502 | 503 => ErrorCode::Unavailable,
        504 => ErrorCode::DeadlineExceeded,
        500 => ErrorCode::Internal,
        _ => ErrorCode::Unknown,
    }
}

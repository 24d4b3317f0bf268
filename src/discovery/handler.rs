//! `POST /discovery` registration endpoint.
//!
//! Accepts `{"service": "...", "host": "...", "port": N}`. Missing fields
//! deserialize to empty values so they surface as the same 400 validation
//! errors as explicitly empty ones.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::{DiscoveryRegistry, Registration};
use crate::error::ProxyError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationRequest {
    pub service: String,
    pub host: String,
    pub port: i64,
}

pub async fn register_handler(
    State(registry): State<Arc<DiscoveryRegistry>>,
    body: Bytes,
) -> Result<StatusCode, ProxyError> {
    let req: RegistrationRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::Registration(format!("invalid registration body: {e}")))?;

    match registry.register(&req.service, &req.host, req.port)? {
        Registration::Added => tracing::info!(
            service = %req.service,
            host = %req.host,
            port = req.port,
            "instance registered"
        ),
        Registration::Reactivated => tracing::info!(
            service = %req.service,
            host = %req.host,
            port = req.port,
            "instance re-registered, marked active"
        ),
    }

    Ok(StatusCode::OK)
}

//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, config source metadata, route and backend counts,
//! the discovery registry summary (when enabled), and cumulative request
//! statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::discovery::RegistrySummary;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryHealth>,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub location: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub routes: usize,
    pub backends: usize,
}

#[derive(Serialize, Deserialize)]
pub struct DiscoveryHealth {
    pub services: usize,
    pub instances: usize,
    pub active_instances: usize,
}

impl From<RegistrySummary> for DiscoveryHealth {
    fn from(summary: RegistrySummary) -> Self {
        Self {
            services: summary.services,
            instances: summary.instances,
            active_instances: summary.active,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let loaded = &state.config;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: loaded.source_name.clone(),
            location: loaded.location.clone(),
            version: loaded.version.short().to_string(),
            loaded_ago_seconds: loaded.loaded_at.elapsed().as_secs(),
            routes: loaded.config.routes.len(),
            backends: loaded.config.total_backends(),
        },
        discovery: state
            .registry
            .as_ref()
            .map(|registry| registry.summary().into()),
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
        },
    })
}

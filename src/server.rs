//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the loaded
//! config, discovery registry, HTTP client, stats, and uptime),
//! [`build_router`] which turns the configured routes into an axum
//! router with its middleware layers, [`build_http_client`] for the
//! connection-pooled hyper client, and [`shutdown_signal`] for
//! SIGTERM / Ctrl+C handling.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, on, post};
use axum::{Extension, Router};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::access::{whitelist_guard, GuardState, Whitelist};
use crate::config::model::{Config, Route};
use crate::config::validation::{DISCOVERY_PATH, HEALTH_PATH};
use crate::config::ConfigVersion;
use crate::discovery::handler::register_handler;
use crate::discovery::DiscoveryRegistry;
use crate::health::health_handler;
use crate::proxy::selector::RouteRuntime;
use crate::proxy::{self, routing};

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<Config>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub location: String,
    pub loaded_at: Instant,
}

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub config: LoadedConfig,
    pub registry: Option<Arc<DiscoveryRegistry>>,
    pub http_client: HttpClient,
    pub start_time: Instant,
    pub trust_proxy_headers: bool,
    pub stats: Stats,
}

impl AppState {
    /// State for a loaded config. The registry exists only when discovery
    /// is enabled.
    #[must_use]
    pub fn new(config: LoadedConfig, http_client: HttpClient) -> Self {
        let registry = config
            .config
            .discovery
            .then(|| Arc::new(DiscoveryRegistry::new()));
        Self {
            trust_proxy_headers: config.config.trust_proxy_headers,
            config,
            registry,
            http_client,
            start_time: Instant::now(),
            stats: Stats::new(),
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    let config = Arc::clone(&state.config.config);

    let mut router = Router::new().route(HEALTH_PATH, get(health_handler));

    if let Some(registry) = &state.registry {
        router = router.route(
            DISCOVERY_PATH,
            post(register_handler).with_state(Arc::clone(registry)),
        );
    }

    for route in &config.routes {
        if let Some(sub) = route_router(route, &config) {
            router = router.merge(sub);
        }
    }

    let whitelist = Whitelist::new(&config.white_list);
    if !whitelist.is_empty() {
        let guard = GuardState {
            whitelist: Arc::new(whitelist),
            trust_proxy_headers: config.trust_proxy_headers,
        };
        router = router.layer(middleware::from_fn_with_state(guard, whitelist_guard));
    }

    if config.compression {
        router = router.layer(CompressionLayer::new());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

/// Router for a single configured route, with its timeout applied.
fn route_router(route: &Route, config: &Config) -> Option<Router<Arc<AppState>>> {
    let sub = if route.is_file_mount() {
        let serve = ServeDir::new(route.file_root().unwrap_or_default());
        match routing::mount_path(&route.path) {
            Some(prefix) => Router::new().nest_service(prefix, serve),
            None => Router::new().fallback_service(serve),
        }
    } else {
        let Some(filter) = routing::method_filter(&route.allowed_methods) else {
            tracing::warn!(route = %route.path, "route has no routable methods, skipping");
            return None;
        };
        let runtime = Arc::new(RouteRuntime::new(route.clone(), &config.upstreams));
        Router::new().route(
            &routing::axum_path(&route.path),
            on(filter, proxy::forward_handler).layer(Extension(runtime)),
        )
    };

    Some(match route.timeout {
        Some(ms) => sub.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_millis(ms),
        )),
        None => sub,
    })
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

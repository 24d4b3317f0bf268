//! `waypost run`: start the proxy server.
//!
//! Loads configuration from a file or URL, initializes logging (with the
//! optional log file the config names), spawns the discovery heartbeat,
//! and serves HTTP or HTTPS until Ctrl+C / SIGTERM. Shutdown drains
//! in-flight requests and stops the heartbeat.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum_server::tls_rustls::RustlsConfig;
use tokio::sync::watch;

use crate::cli::RunArgs;
use crate::config::sources::file_source::FileSource;
use crate::config::sources::url_source::UrlSource;
use crate::config::validation::{self, resolve_listen};
use crate::config::ConfigSource;
use crate::discovery::heartbeat::HeartbeatSettings;
use crate::error::{ValidationError, WaypostError};
use crate::logging;
use crate::server::{self, AppState, LoadedConfig};

const CONFIG_CANDIDATES: &[&str] = &[
    "waypost.json",
    #[cfg(feature = "yaml")]
    "waypost.yaml",
    #[cfg(feature = "yaml")]
    "waypost.yml",
    #[cfg(feature = "toml")]
    "waypost.toml",
];

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn execute(args: RunArgs) -> Result<(), WaypostError> {
    let http_client = server::build_http_client();

    let source = resolve_config_source(args.config.as_deref(), &http_client).await?;
    let (mut config, version) = source.load().await?;

    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    let addr = resolve_listen(&config.listen).map_err(|message| WaypostError::ConfigValidation {
        errors: vec![ValidationError {
            route: "(root)".into(),
            field: "listen".into(),
            message,
            suggestion: None,
        }],
    })?;

    let log_file = (!config.log.is_empty()).then(|| Path::new(&config.log));
    logging::init(
        &args.log_level,
        logging::resolve_format(args.pretty, args.json),
        log_file,
    )?;

    for warning in validation::listen_warnings(&config) {
        tracing::warn!(listen = %config.listen, "{warning}");
    }
    for warning in validation::cache_warnings(&config) {
        tracing::warn!("{warning}");
    }

    let route_count = config.routes.len();
    let backend_count = config.total_backends();
    let tls = config
        .tls_enabled()
        .then(|| (PathBuf::from(&config.certificate), PathBuf::from(&config.key)));

    let state = Arc::new(AppState::new(
        LoadedConfig {
            config: Arc::new(config),
            version,
            source_name: source.name().to_string(),
            location: source.location(),
            loaded_at: Instant::now(),
        },
        http_client,
    ));

    // Dropping or signalling shutdown_tx stops the heartbeat
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let heartbeat_handle = state.registry.as_ref().map(|registry| {
        let settings = HeartbeatSettings {
            interval: Duration::from_secs(args.heartbeat_interval.max(1)),
            ..HeartbeatSettings::default()
        };
        tokio::spawn(Arc::clone(registry).run_heartbeat(settings, shutdown_rx))
    });

    let router = server::build_router(Arc::clone(&state), args.max_body);
    let app = router.into_make_service_with_connect_info::<SocketAddr>();

    tracing::info!(
        addr = %addr,
        routes = route_count,
        backends = backend_count,
        discovery = state.registry.is_some(),
        tls = tls.is_some(),
        config = %state.config.location,
        version = %state.config.version.short(),
        "waypost started"
    );

    if let Some((cert, key)) = tls {
        let rustls_config = load_tls_config(&cert, &key).await?;
        let handle = axum_server::Handle::new();

        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            server::shutdown_signal().await;
            let _ = shutdown_tx.send(true);
            shutdown_handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, rustls_config)
            .handle(handle)
            .serve(app)
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let graceful_shutdown = async move {
            server::shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(graceful_shutdown)
            .await?;
    }

    if let Some(handle) = heartbeat_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "discovery heartbeat task failed");
        }
    }

    tracing::info!("waypost stopped");
    Ok(())
}

async fn resolve_config_source(
    explicit: Option<&str>,
    http_client: &server::HttpClient,
) -> Result<Box<dyn ConfigSource>, WaypostError> {
    if let Some(location) = explicit {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Box::new(UrlSource::new(
                location.to_string(),
                http_client.clone(),
            )));
        }
        return Ok(Box::new(FileSource::new(PathBuf::from(location))));
    }

    for name in CONFIG_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Box::new(FileSource::new(path)));
        }
    }

    Err(WaypostError::NoConfigSource {
        hint: "Provide --config <file|url>, or place waypost.json in the current directory.\n  \
               Run 'waypost init' to create a config file."
            .into(),
    })
}

async fn load_tls_config(cert: &Path, key: &Path) -> Result<RustlsConfig, WaypostError> {
    for path in [cert, key] {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(WaypostError::Tls(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
    }
    RustlsConfig::from_pem_file(cert, key)
        .await
        .map_err(WaypostError::Tls)
}

//! Shared helpers for integration tests: an echo backend stub and a
//! proxy instance bound to an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tokio::sync::oneshot;

use waypost::config::model::Config;
use waypost::config::sources::parse_validate_hash;
use waypost::server::{self, AppState, LoadedConfig};

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn serve(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        shutdown: Some(tx),
    }
}

/// Backend stub that echoes the request it received as JSON, tags the
/// response with `x-backend: <name>`, and sets two cookies. Paths ending
/// in `/slow` answer after two seconds.
pub async fn start_backend(name: &'static str) -> TestServer {
    serve(Router::new().fallback(echo).with_state(name)).await
}

async fn echo(
    State(name): State<&'static str>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    if uri.path().ends_with("/slow") {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let received: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                serde_json::Value::from(v.to_str().unwrap_or_default()),
            )
        })
        .collect();

    let mut response = Json(serde_json::json!({
        "backend": name,
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": received,
        "body": body,
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert("x-backend", HeaderValue::from_static(name));
    headers.append(header::SET_COOKIE, HeaderValue::from_static("session=abc; Path=/"));
    headers.append(header::SET_COOKIE, HeaderValue::from_static("theme=dark"));
    response
}

/// Parse and validate a JSON config the way the `run` command does.
pub fn config(json: &str) -> (Config, waypost::config::ConfigVersion) {
    parse_validate_hash("json", json, "test.json").unwrap()
}

pub struct TestProxy {
    pub server: TestServer,
    pub state: Arc<AppState>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        self.server.url(path)
    }
}

pub async fn start_proxy(json: &str) -> TestProxy {
    let (config, version) = config(json);
    let state = Arc::new(AppState::new(
        LoadedConfig {
            config: Arc::new(config),
            version,
            source_name: "test".into(),
            location: "test.json".into(),
            loaded_at: Instant::now(),
        },
        server::build_http_client(),
    ));

    let router = server::build_router(Arc::clone(&state), 1_048_576);
    TestProxy {
        server: serve(router).await,
        state,
    }
}

/// Test client that ignores proxy environment variables.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

//! Core HTTP request forwarding handler.
//!
//! [`forward_handler`] is mounted once per configured route, with that
//! route's [`RouteRuntime`] attached as an extension. Per request it
//! buffers the inbound body, picks a backend, builds the outbound request
//! through the header policy, dispatches it, and streams the upstream
//! response back. A dispatch failure against a discovery instance marks
//! that instance inactive. Submodules handle path translation
//! ([`routing`]), headers ([`headers`]), and backend choice
//! ([`selector`]).

pub mod headers;
pub mod routing;
pub mod selector;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use http_body_util::Full;

use crate::access::client_ip;
use crate::error::ProxyError;
use crate::server::AppState;
use selector::{build_url, RouteRuntime};

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    Extension(runtime): Extension<Arc<RouteRuntime>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let route = &runtime.route;
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(route = %route.path, error = %e, "failed to read request body");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return ProxyError::BodyRead(e.to_string()).into_response();
        }
    };

    let backend = match runtime.resolve(state.registry.as_deref()) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(route = %route.path, error = %e, "no backend available");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return e.into_response();
        }
    };

    let url = build_url(
        &backend.base,
        parts.uri.path(),
        parts.uri.query(),
        route.append_path,
    );

    let mut outbound_headers = headers::copy_request_headers(&parts.headers);
    headers::apply_custom_headers(&runtime.custom_headers, &mut outbound_headers);
    if route.forward_ip {
        let ip = client_ip(&parts.headers, peer, state.trust_proxy_headers);
        headers::apply_forwarded_ip(ip, &mut outbound_headers);
    }

    let uri: hyper::Uri = match url.parse() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(route = %route.path, url = %url, error = %e, "invalid upstream URL");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return ProxyError::InvalidUpstreamUri(format!("invalid upstream URL '{url}': {e}"))
                .into_response();
        }
    };

    let mut outbound = hyper::Request::new(Full::new(body));
    *outbound.method_mut() = parts.method.clone();
    *outbound.uri_mut() = uri;
    *outbound.headers_mut() = outbound_headers;

    tracing::debug!(
        route = %route.path,
        method = %parts.method,
        upstream = %url,
        "backend selected"
    );

    match state.http_client.request(outbound).await {
        Ok(upstream) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            let (upstream_parts, incoming) = upstream.into_parts();

            let mut response_headers = runtime.response_headers.clone();
            headers::copy_response_headers(&upstream_parts.headers, &mut response_headers);

            let mut response = Response::new(Body::new(incoming));
            *response.status_mut() = upstream_parts.status;
            *response.headers_mut() = response_headers;
            response
        }
        Err(e) => {
            tracing::warn!(
                route = %route.path,
                upstream = %url,
                error = %e,
                "upstream dispatch failed"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);

            if let (Some(instance), Some(registry)) = (&backend.instance, &state.registry) {
                if registry.mark_inactive(instance) {
                    tracing::warn!(instance = %instance, "instance marked inactive");
                }
            }

            let mut response = ProxyError::Dispatch(e.to_string()).into_response();
            for (name, value) in &runtime.response_headers {
                response.headers_mut().insert(name.clone(), value.clone());
            }
            response
        }
    }
}

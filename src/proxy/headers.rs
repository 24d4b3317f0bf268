//! Header policy for proxied requests and responses.
//!
//! Response side: [`policy_response_headers`] builds the security and CORS
//! headers once per route; [`copy_response_headers`] lays the upstream
//! headers over them. Request side: [`copy_request_headers`] collapses the
//! inbound headers to their first value, then [`apply_custom_headers`] and
//! [`apply_forwarded_ip`] run in that order.
//!
//! Every multi-valued header is collapsed to its first value except
//! `Set-Cookie` on the response, which keeps every cookie.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::model::{CorsConfig, Route};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

pub const SECURE_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("x-content-type-options", "nosniff"),
    ("content-security-policy", "default-src 'self'"),
    (
        "strict-transport-security",
        "max-age=31536000; includeSubDomains; preload",
    ),
];

pub fn secure_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURE_HEADERS {
        headers.insert(*name, HeaderValue::from_static(*value));
    }
}

/// One response header per configured CORS field. Absent and empty
/// fields emit nothing.
pub fn cors_headers(cors: &CorsConfig, headers: &mut HeaderMap) {
    let fields: [(&'static str, Option<&str>); 6] = [
        ("access-control-allow-origin", cors.origin.as_deref()),
        ("access-control-allow-methods", cors.methods.as_deref()),
        ("access-control-max-age", cors.max_age.as_deref()),
        ("access-control-allow-headers", cors.allowed_headers.as_deref()),
        ("access-control-allow-cache", cors.cache_control.as_deref()),
        ("access-control-allow-vary", cors.vary.as_deref()),
    ];
    for (name, value) in fields {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };
        match HeaderValue::from_str(value) {
            Ok(val) => {
                headers.insert(name, val);
            }
            Err(_) => {
                tracing::warn!(header = name, "invalid CORS header value, skipping");
            }
        }
    }
    if cors.credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// Security headers (when enabled) followed by CORS headers for a route.
#[must_use]
pub fn policy_response_headers(route: &Route) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if route.secure_headers {
        secure_headers(&mut headers);
    }
    cors_headers(&route.cors, &mut headers);
    headers
}

/// Parse a route's custom headers, dropping (and logging) invalid pairs.
#[must_use]
pub fn parse_custom_headers(route_path: &str, custom: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in custom {
        match (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), Ok(val)) => {
                headers.insert(name, val);
            }
            _ => {
                tracing::warn!(route = %route_path, header = %key, "invalid custom header name or value, skipping");
            }
        }
    }
    headers
}

/// First value of every inbound header, minus `Host` and hop-by-hop headers.
#[must_use]
pub fn copy_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.keys_len());
    for name in inbound.keys() {
        if name == header::HOST || HOP_BY_HOP.contains(name) {
            continue;
        }
        if let Some(value) = inbound.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    headers
}

/// Custom headers override any same-named inbound header.
pub fn apply_custom_headers(custom: &HeaderMap, headers: &mut HeaderMap) {
    for (name, value) in custom {
        headers.insert(name.clone(), value.clone());
    }
}

pub fn apply_forwarded_ip(client_ip: IpAddr, headers: &mut HeaderMap) {
    if let Ok(val) = HeaderValue::from_str(&client_ip.to_string()) {
        headers.insert("x-forwarded-for", val);
    }
}

/// Lay the upstream headers over `out`, first value each, then re-add
/// every `Set-Cookie` individually.
pub fn copy_response_headers(upstream: &HeaderMap, out: &mut HeaderMap) {
    for name in upstream.keys() {
        if HOP_BY_HOP.contains(name) {
            continue;
        }
        if let Some(value) = upstream.get(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    out.remove(header::SET_COOKIE);
    for cookie in upstream.get_all(header::SET_COOKIE) {
        out.append(header::SET_COOKIE, cookie.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_headers_are_exact() {
        let mut headers = HeaderMap::new();
        secure_headers(&mut headers);
        assert_eq!(headers.len(), 5);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["content-security-policy"], "default-src 'self'");
        assert_eq!(
            headers["strict-transport-security"],
            "max-age=31536000; includeSubDomains; preload"
        );
    }

    #[test]
    fn cors_emits_only_configured_fields() {
        let cors = CorsConfig {
            origin: Some("*".into()),
            methods: Some("GET,POST".into()),
            ..CorsConfig::default()
        };
        let mut headers = HeaderMap::new();
        cors_headers(&cors, &mut headers);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET,POST");
    }

    #[test]
    fn cors_full_mapping() {
        let cors = CorsConfig {
            origin: Some("https://a.example".into()),
            methods: Some("GET".into()),
            credentials: true,
            max_age: Some("600".into()),
            allowed_headers: Some("X-Token".into()),
            cache_control: Some("no-cache".into()),
            vary: Some("Origin".into()),
        };
        let mut headers = HeaderMap::new();
        cors_headers(&cors, &mut headers);
        assert_eq!(headers.len(), 7);
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-max-age"], "600");
        assert_eq!(headers["access-control-allow-headers"], "X-Token");
        assert_eq!(headers["access-control-allow-cache"], "no-cache");
        assert_eq!(headers["access-control-allow-vary"], "Origin");
    }

    #[test]
    fn empty_cors_emits_nothing() {
        let mut headers = HeaderMap::new();
        cors_headers(&CorsConfig::default(), &mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn empty_cors_strings_emit_nothing() {
        let cors: CorsConfig =
            serde_json::from_str(r#"{"origin": "*", "vary": "", "maxAge": ""}"#).unwrap();
        let mut headers = HeaderMap::new();
        cors_headers(&cors, &mut headers);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["access-control-allow-origin"], "*");
    }

    #[test]
    fn request_headers_collapse_to_first_value() {
        let mut inbound = HeaderMap::new();
        inbound.append("accept", "text/html".parse().unwrap());
        inbound.append("accept", "application/json".parse().unwrap());
        inbound.insert("host", "proxy.local".parse().unwrap());
        inbound.insert("connection", "keep-alive".parse().unwrap());

        let out = copy_request_headers(&inbound);
        assert_eq!(out.get_all("accept").iter().count(), 1);
        assert_eq!(out["accept"], "text/html");
        assert!(out.get("host").is_none());
        assert!(out.get("connection").is_none());
    }

    #[test]
    fn custom_headers_override_then_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-source", "client".parse().unwrap());
        headers.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());

        let custom = parse_custom_headers(
            "/api",
            &HashMap::from([
                ("X-Source".to_string(), "gateway".to_string()),
                ("bad header".to_string(), "x".to_string()),
            ]),
        );
        assert_eq!(custom.len(), 1);

        apply_custom_headers(&custom, &mut headers);
        apply_forwarded_ip("10.0.0.9".parse().unwrap(), &mut headers);
        assert_eq!(headers["x-source"], "gateway");
        assert_eq!(headers["x-forwarded-for"], "10.0.0.9");
    }

    #[test]
    fn response_keeps_every_cookie_once() {
        let mut upstream = HeaderMap::new();
        upstream.append("set-cookie", "a=1".parse().unwrap());
        upstream.append("set-cookie", "b=2".parse().unwrap());
        upstream.append("x-multi", "first".parse().unwrap());
        upstream.append("x-multi", "second".parse().unwrap());
        upstream.insert("transfer-encoding", "chunked".parse().unwrap());

        let mut out = HeaderMap::new();
        copy_response_headers(&upstream, &mut out);

        let cookies: Vec<_> = out.get_all("set-cookie").iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(out.get_all("x-multi").iter().count(), 1);
        assert_eq!(out["x-multi"], "first");
        assert!(out.get("transfer-encoding").is_none());
    }

    #[test]
    fn upstream_overrides_policy_headers() {
        let route = Route {
            secure_headers: true,
            ..Route::default()
        };
        let mut out = policy_response_headers(&route);
        let mut upstream = HeaderMap::new();
        upstream.insert("x-frame-options", "SAMEORIGIN".parse().unwrap());

        copy_response_headers(&upstream, &mut out);
        assert_eq!(out["x-frame-options"], "SAMEORIGIN");
        assert_eq!(out["x-content-type-options"], "nosniff");
    }
}

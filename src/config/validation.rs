//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors: a bad listen address, missing routes, malformed paths and
//! forward targets, unknown HTTP methods, dangling upstream references,
//! and reserved paths. Every problem is collected as a
//! [`ValidationError`] so the operator sees them all at once.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use super::model::{Config, SCHEMES};
use crate::error::ValidationError;
use crate::proxy::routing::{axum_path, mount_path};

/// Catch-all name used when a file mount is nested under its prefix.
const MOUNT_TAIL: &str = "mount_tail";

pub const VALID_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];

pub const HEALTH_PATH: &str = "/health";
pub const DISCOVERY_PATH: &str = "/discovery";

/// Validate a single route path. Returns `Ok(())` or a human-readable error.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path cannot be empty".into());
    }
    if !path.starts_with('/') {
        return Err(format!("path must start with '/' (did you mean '/{path}'?)"));
    }
    Ok(())
}

/// Validate an HTTP method string. Returns `Ok(())` or a human-readable error.
pub fn validate_method(method: &str) -> Result<(), String> {
    let upper = method.to_uppercase();
    if VALID_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(format!("'{method}' is not a valid HTTP method"))
    }
}

/// Resolve a Go-style listen address (`":80"`, `"127.0.0.1:8080"`,
/// `"localhost:3000"`, `"[::1]:443"`) to a socket address. An empty host
/// binds every IPv4 interface.
pub fn resolve_listen(listen: &str) -> Result<SocketAddr, String> {
    if listen.is_empty() {
        return Err("listen address is not set".into());
    }
    let Some((host, port)) = listen.rsplit_once(':') else {
        return Err(format!("'{listen}' is missing a port (expected host:port)"));
    };
    let port: u16 = port
        .parse()
        .map_err(|_| format!("'{port}' is not a valid port"))?;
    if port == 0 {
        return Err("port must be non-zero".into());
    }

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve host '{host}': {e}"))?
        .next()
        .ok_or_else(|| format!("host '{host}' resolved to no addresses"))
}

#[allow(clippy::too_many_lines)]
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(msg) = resolve_listen(&config.listen) {
        errors.push(root_error("listen", msg));
    }

    if config.certificate.is_empty() != config.key.is_empty() {
        errors.push(root_error(
            "certificate",
            "certificate and key must be set together".into(),
        ));
    }

    if config.routes.is_empty() {
        errors.push(root_error(
            "routes",
            "at least one route must be defined".into(),
        ));
        return Err(errors);
    }

    let mut seen_paths = std::collections::HashSet::new();

    for (i, route) in config.routes.iter().enumerate() {
        let route_id = if route.path.is_empty() {
            format!("routes[{i}]")
        } else {
            route.path.clone()
        };

        if let Err(msg) = validate_path(&route.path) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "path".into(),
                message: msg,
                suggestion: if !route.path.is_empty() && !route.path.starts_with('/') {
                    Some(format!("did you mean '/{}'?", route.path))
                } else {
                    None
                },
            });
        }

        if !seen_paths.insert(&route.path) {
            errors.push(route_error(&route_id, "path", "duplicate route path".into()));
        }

        if route.path == HEALTH_PATH || (config.discovery && route.path == DISCOVERY_PATH) {
            errors.push(route_error(
                &route_id,
                "path",
                format!("{} is a reserved route", route.path),
            ));
        }

        let Some(prefix) = route.forward_prefix() else {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "forwardUrl".into(),
                message: format!("'{}' is not a valid forwardUrl", route.forward_url),
                suggestion: Some("expected 'scheme://host' or 'upstream:path'".into()),
            });
            continue;
        };

        if route.allowed_methods.is_empty() && !route.is_file_mount() {
            errors.push(route_error(
                &route_id,
                "allowedMethods",
                "must contain at least one allowed method".into(),
            ));
        }

        for method in &route.allowed_methods {
            if let Err(msg) = validate_method(method) {
                errors.push(route_error(&route_id, "allowedMethods", msg));
            }
        }

        if route.discovery {
            if !config.discovery {
                errors.push(ValidationError {
                    route: route_id.clone(),
                    field: "discovery".into(),
                    message: "route uses discovery but discovery is disabled".into(),
                    suggestion: Some("set \"discovery\": true at the top level".into()),
                });
            }
            if prefix.is_empty() || SCHEMES.contains(&prefix) {
                errors.push(route_error(
                    &route_id,
                    "forwardUrl",
                    format!("'{prefix}' is not a service name"),
                ));
            }
        } else if !SCHEMES.contains(&prefix) && !config.upstreams.contains_key(prefix) {
            errors.push(route_error(
                &route_id,
                "forwardUrl",
                format!("{} forwardUrl not in upstreams", route.forward_url),
            ));
        }

        if route.is_file_mount() && route.file_root().map_or(true, str::is_empty) {
            errors.push(route_error(
                &route_id,
                "forwardUrl",
                "file mount must name a directory (file://<dir>)".into(),
            ));
        }

        if route.timeout == Some(0) {
            errors.push(route_error(
                &route_id,
                "timeout",
                "timeout must be greater than zero".into(),
            ));
        }
    }

    errors.extend(route_table_errors(config));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Register every route in a scratch path matcher exactly as the router
/// will, so patterns the router would refuse are reported here instead of
/// aborting startup.
fn route_table_errors(config: &Config) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut table = matchit::Router::new();
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut root_mount: Option<&str> = None;

    let mut reserved = vec![HEALTH_PATH];
    if config.discovery {
        reserved.push(DISCOVERY_PATH);
    }
    for path in &reserved {
        if table.insert(*path, ()).is_ok() {
            owners.insert((*path).to_string(), (*path).to_string());
        }
    }

    for route in &config.routes {
        if validate_path(&route.path).is_err()
            || route.forward_prefix().is_none()
            || reserved.contains(&route.path.as_str())
        {
            continue;
        }

        if route.path.split('/').any(|segment| segment == ":") {
            errors.push(route_error(
                &route.path,
                "path",
                "parameter name cannot be empty".into(),
            ));
            continue;
        }

        let patterns = if route.is_file_mount() {
            match mount_path(&route.path) {
                None => {
                    if let Some(first) = root_mount.replace(&route.path) {
                        errors.push(route_error(
                            &route.path,
                            "path",
                            format!("file mount at / conflicts with route {first}"),
                        ));
                    }
                    continue;
                }
                Some(prefix) if prefix.contains([':', '*', '{']) => {
                    errors.push(route_error(
                        &route.path,
                        "path",
                        "file mount path cannot contain parameters or wildcards".into(),
                    ));
                    continue;
                }
                Some(prefix) => vec![
                    format!("{prefix}/{{*{MOUNT_TAIL}}}"),
                    prefix.to_string(),
                    format!("{prefix}/"),
                ],
            }
        } else {
            vec![axum_path(&route.path)]
        };

        for pattern in patterns {
            match table.insert(pattern.clone(), ()) {
                Ok(()) => {
                    owners.insert(pattern, route.path.clone());
                }
                Err(matchit::InsertError::Conflict { with }) => {
                    let other = owners.get(&with).cloned().unwrap_or(with);
                    errors.push(route_error(
                        &route.path,
                        "path",
                        format!("conflicts with route {other}"),
                    ));
                    break;
                }
                Err(e) => {
                    errors.push(route_error(&route.path, "path", e.to_string()));
                    break;
                }
            }
        }
    }

    errors
}

/// Non-fatal advice about the listen port, logged once at startup.
#[must_use]
pub fn listen_warnings(config: &Config) -> Vec<&'static str> {
    let port = config
        .listen
        .rsplit_once(':')
        .and_then(|(_, p)| p.parse::<u16>().ok());
    match (port, config.tls_enabled()) {
        (Some(80), true) => vec!["serving HTTPS on port 80, port 443 is recommended"],
        (Some(443), false) => vec!["serving plain HTTP on port 443, port 80 is recommended"],
        _ => Vec::new(),
    }
}

/// Routes that set `cache`, which has no effect.
#[must_use]
pub fn cache_warnings(config: &Config) -> Vec<String> {
    config
        .routes
        .iter()
        .filter(|route| route.cache.is_some())
        .map(|route| format!("route {} sets cache, response caching is not supported", route.path))
        .collect()
}

fn root_error(field: &str, message: String) -> ValidationError {
    route_error("(root)", field, message)
}

fn route_error(route: &str, field: &str, message: String) -> ValidationError {
    ValidationError {
        route: route.to_string(),
        field: field.to_string(),
        message,
        suggestion: None,
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} routes, {} static backends, discovery {}\n",
        config.routes.len(),
        config.total_backends(),
        if config.discovery { "on" } else { "off" },
    )];

    for route in &config.routes {
        let mode = if route.discovery {
            "discovery"
        } else if route.is_file_mount() {
            "static files"
        } else {
            "round robin"
        };
        lines.push(format!("  {}  -> {} ({mode})", route.path, route.forward_url));
        if !route.allowed_methods.is_empty() {
            lines.push(format!("    methods: {}", route.allowed_methods.join(", ")));
        }
        if let Some(timeout) = route.timeout {
            lines.push(format!("    timeout: {timeout}ms"));
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{Config, Route};

    fn route(path: &str, forward_url: &str) -> Route {
        Route {
            path: path.into(),
            forward_url: forward_url.into(),
            allowed_methods: vec!["GET".into()],
            ..Route::default()
        }
    }

    fn config_with(routes: Vec<Route>) -> Config {
        let mut config: Config = serde_json::from_str(r#"{"routes": []}"#).unwrap();
        config.listen = "127.0.0.1:8080".into();
        config.routes = routes;
        config
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&config_with(vec![route("/", "http://localhost/")])).is_ok());
    }

    #[test]
    fn empty_routes_fails() {
        let errors = validate(&config_with(vec![])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("at least one route"));
    }

    #[test]
    fn unknown_upstream_fails() {
        let errors = validate(&config_with(vec![route("/", "local:/")])).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("not in upstreams")));
    }

    #[test]
    fn known_upstream_passes() {
        let mut config = config_with(vec![route("/", "local:/")]);
        config
            .upstreams
            .insert("local".into(), vec!["http://localhost:8080".into()]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn forward_url_without_colon_fails() {
        let errors = validate(&config_with(vec![route("/", "")])).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "forwardUrl"));
    }

    #[test]
    fn missing_methods_fails_unless_file_mount() {
        let mut r = route("/", "https://localhost");
        r.allowed_methods.clear();
        assert!(validate(&config_with(vec![r])).is_err());

        let mut r = route("/static", "file:///var/www");
        r.allowed_methods.clear();
        assert!(validate(&config_with(vec![r])).is_ok());
    }

    #[test]
    fn invalid_method_fails() {
        let mut r = route("/", "http://localhost");
        r.allowed_methods = vec!["FETCH".into()];
        let errors = validate(&config_with(vec![r])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("not a valid HTTP method")));
    }

    #[test]
    fn empty_path_fails() {
        let errors = validate(&config_with(vec![route("", "http://localhost")])).unwrap_err();
        assert!(errors.iter().any(|e| e.route == "routes[0]"));
    }

    #[test]
    fn path_without_slash_suggests_fix() {
        let errors = validate(&config_with(vec![route("api", "http://localhost")])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.suggestion.as_deref() == Some("did you mean '/api'?")));
    }

    #[test]
    fn reserved_discovery_path_fails_when_enabled() {
        let mut config = config_with(vec![route("/discovery", "http://localhost")]);
        assert!(validate(&config).is_ok());
        config.discovery = true;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("reserved")));
    }

    #[test]
    fn discovery_route_requires_global_flag() {
        let mut r = route("/users", "users:8080");
        r.discovery = true;
        let mut config = config_with(vec![r]);
        assert!(validate(&config).is_err());
        config.discovery = true;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn listen_validation() {
        let mut config = config_with(vec![route("/", "http://localhost")]);
        for bad in ["", "devlocal", ":", ":0"] {
            config.listen = bad.into();
            assert!(validate(&config).is_err(), "{bad:?} should be rejected");
        }
        config.listen = ":80".into();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn resolve_listen_handles_go_style_addresses() {
        assert_eq!(
            resolve_listen(":80").unwrap(),
            "0.0.0.0:80".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            resolve_listen("[::1]:8443").unwrap(),
            "[::1]:8443".parse::<SocketAddr>().unwrap()
        );
        assert!(resolve_listen("127.0.0.1:65536").is_err());
    }

    #[test]
    fn port_mismatch_warnings() {
        let mut config = config_with(vec![route("/", "http://localhost")]);
        config.listen = ":443".into();
        assert_eq!(listen_warnings(&config).len(), 1);
        config.certificate = "cert.pem".into();
        config.key = "key.pem".into();
        assert!(listen_warnings(&config).is_empty());
        config.listen = ":80".into();
        assert_eq!(listen_warnings(&config).len(), 1);
    }

    fn path_errors(config: &Config) -> Vec<String> {
        validate(config)
            .unwrap_err()
            .into_iter()
            .filter(|e| e.field == "path")
            .map(|e| format!("{}: {}", e.route, e.message))
            .collect()
    }

    #[test]
    fn sibling_parameters_conflict() {
        let mut post = route("/users/:name", "http://localhost");
        post.allowed_methods = vec!["POST".into()];
        let config = config_with(vec![route("/users/:id", "http://localhost"), post]);
        let errors = path_errors(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("/users/:name: conflicts with route"));
    }

    #[test]
    fn empty_parameter_name_fails() {
        let config = config_with(vec![route("/a/:", "http://localhost")]);
        assert_eq!(path_errors(&config), ["/a/:: parameter name cannot be empty"]);
    }

    #[test]
    fn file_mount_conflicts_with_catch_all() {
        let mount = Route {
            path: "/static".into(),
            forward_url: "file:///var/www".into(),
            ..Route::default()
        };
        let config = config_with(vec![mount, route("/static/*path", "http://localhost")]);
        let errors = path_errors(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("/static/*path: conflicts with route"));
    }

    #[test]
    fn catch_all_must_be_last() {
        let config = config_with(vec![route("/a/*rest/b", "http://localhost")]);
        assert_eq!(path_errors(&config).len(), 1);
    }

    #[test]
    fn distinct_patterns_coexist() {
        let config = config_with(vec![
            route("/users/:id", "http://localhost"),
            route("/users/:id/orders", "http://localhost"),
            route("/users/me", "http://localhost"),
            route("/static/*path", "http://localhost"),
            Route {
                path: "/assets".into(),
                forward_url: "file:///var/www".into(),
                ..Route::default()
            },
        ]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn second_root_mount_fails() {
        let mount = |path: &str| Route {
            path: path.into(),
            forward_url: "file:///var/www".into(),
            ..Route::default()
        };
        let config = config_with(vec![mount("/"), mount("//")]);
        assert_eq!(path_errors(&config), ["//: file mount at / conflicts with route /"]);
    }

    #[test]
    fn cache_is_valid_but_warned() {
        let mut cached = route("/api", "http://localhost");
        cached.cache = Some(30);
        let config = config_with(vec![cached, route("/other", "http://localhost")]);
        assert!(validate(&config).is_ok());
        assert_eq!(
            cache_warnings(&config),
            ["route /api sets cache, response caching is not supported"]
        );
    }

    #[test]
    fn certificate_without_key_fails() {
        let mut config = config_with(vec![route("/", "http://localhost")]);
        config.certificate = "cert.pem".into();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "certificate"));
    }
}

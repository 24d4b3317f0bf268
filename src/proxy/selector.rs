//! Per-route runtime: backend selection plus precomputed header policy.

use std::collections::HashMap;

use axum::http::HeaderMap;

use super::headers::{parse_custom_headers, policy_response_headers};
use crate::balancer::RoundRobin;
use crate::config::model::Route;
use crate::discovery::{DiscoveryRegistry, InstanceKey};
use crate::error::ProxyError;

#[derive(Debug)]
pub enum BackendSelector {
    Static(RoundRobin),
    Discovery { service: String },
}

/// Where one request goes. `instance` is set when the backend came from
/// the discovery registry, so a dispatch failure can be reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub base: String,
    pub instance: Option<InstanceKey>,
}

#[derive(Debug)]
pub struct RouteRuntime {
    pub route: Route,
    pub selector: BackendSelector,
    pub response_headers: HeaderMap,
    pub custom_headers: HeaderMap,
}

impl RouteRuntime {
    #[must_use]
    pub fn new(route: Route, upstreams: &HashMap<String, Vec<String>>) -> Self {
        let selector = if route.discovery {
            BackendSelector::Discovery {
                service: route.forward_prefix().unwrap_or_default().to_string(),
            }
        } else {
            BackendSelector::Static(RoundRobin::for_route(&route, upstreams))
        };

        Self {
            response_headers: policy_response_headers(&route),
            custom_headers: parse_custom_headers(&route.path, &route.custom_headers),
            selector,
            route,
        }
    }

    pub fn resolve(&self, registry: Option<&DiscoveryRegistry>) -> Result<Backend, ProxyError> {
        match &self.selector {
            BackendSelector::Static(rr) => Ok(Backend {
                base: rr.next().to_string(),
                instance: None,
            }),
            BackendSelector::Discovery { service } => {
                let registry = registry.ok_or_else(|| ProxyError::NoActiveInstance {
                    service: service.clone(),
                })?;
                let key = registry.select(service)?;
                Ok(Backend {
                    base: format!("http://{}", key.authority()),
                    instance: Some(key),
                })
            }
        }
    }
}

/// Outbound URL: base without trailing slashes, the inbound path when
/// `append_path` is set, then `?` and the raw query (the `?` is always
/// present).
#[must_use]
pub fn build_url(base: &str, path: &str, query: Option<&str>, append_path: bool) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    if append_path {
        url.push_str(path);
    }
    url.push('?');
    url.push_str(query.unwrap_or_default());
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(forward_url: &str, discovery: bool) -> Route {
        Route {
            path: "/api".into(),
            forward_url: forward_url.into(),
            allowed_methods: vec!["GET".into()],
            discovery,
            ..Route::default()
        }
    }

    #[test]
    fn build_url_appends_path_and_query() {
        assert_eq!(
            build_url("http://backend:9000", "/api", Some("x=1"), true),
            "http://backend:9000/api?x=1"
        );
        assert_eq!(
            build_url("http://backend:9000//", "/api", None, false),
            "http://backend:9000?"
        );
        assert_eq!(
            build_url("http://backend:9000/v1/", "/users", Some("a=b&c"), true),
            "http://backend:9000/v1/users?a=b&c"
        );
    }

    #[test]
    fn static_route_rotates() {
        let upstreams = HashMap::from([(
            "pool".to_string(),
            vec!["http://a:1".to_string(), "http://b:2".to_string()],
        )]);
        let rt = RouteRuntime::new(route("pool:/v1", false), &upstreams);
        let picks: Vec<String> = (0..3).map(|_| rt.resolve(None).unwrap().base).collect();
        assert_eq!(picks, ["http://a:1/v1", "http://b:2/v1", "http://a:1/v1"]);
    }

    #[test]
    fn discovery_route_uses_registry() {
        let registry = DiscoveryRegistry::new();
        registry.register("users", "10.0.0.1", 8080).unwrap();
        let rt = RouteRuntime::new(route("users:8080", true), &HashMap::new());

        let backend = rt.resolve(Some(&registry)).unwrap();
        assert_eq!(backend.base, "http://10.0.0.1:8080");
        assert_eq!(backend.instance.unwrap().service, "users");
    }

    #[test]
    fn discovery_route_without_instances_is_unavailable() {
        let registry = DiscoveryRegistry::new();
        let rt = RouteRuntime::new(route("users:8080", true), &HashMap::new());
        assert!(matches!(
            rt.resolve(Some(&registry)),
            Err(ProxyError::NoActiveInstance { .. })
        ));
        assert!(matches!(
            rt.resolve(None),
            Err(ProxyError::NoActiveInstance { .. })
        ));
    }
}

//! Serde data structures for the waypost configuration file.
//!
//! Contains [`Config`] (the root), [`Route`], and [`CorsConfig`]. Field
//! names are camelCase on the wire and unknown fields are rejected.
//! These types are immutable once loaded; mutable runtime state (cursors,
//! health flags) lives in [`crate::balancer`] and [`crate::discovery`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Forward-target prefixes that are URL schemes rather than upstream or
/// service names.
pub const SCHEMES: &[&str] = &["http", "https", "file"];

fn default_listen() -> String {
    ":80".to_string()
}

fn is_default_listen(v: &str) -> bool {
    v == default_listen()
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_listen", skip_serializing_if = "is_default_listen")]
    pub listen: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certificate: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub white_list: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub compression: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub trust_proxy_headers: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub discovery: bool,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub upstreams: HashMap<String, Vec<String>>,

    pub routes: Vec<Route>,
}

impl Config {
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        !self.certificate.is_empty() && !self.key.is_empty()
    }

    /// Total number of static backends across all non-discovery routes.
    #[must_use]
    pub fn total_backends(&self) -> usize {
        self.routes
            .iter()
            .filter(|r| !r.discovery && !r.is_file_mount())
            .map(|r| {
                r.forward_prefix()
                    .and_then(|p| self.upstreams.get(p))
                    .filter(|hosts| !hosts.is_empty())
                    .map_or(1, Vec::len)
            })
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Route {
    pub path: String,

    pub forward_url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_methods: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub forward_ip: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub append_path: bool,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_headers: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub secure_headers: bool,

    #[serde(default, skip_serializing_if = "CorsConfig::is_empty")]
    pub cors: CorsConfig,

    #[serde(default, skip_serializing_if = "is_false")]
    pub discovery: bool,

    /// Per-route deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Response cache lifetime in seconds. Parsed so existing configs
    /// load, but responses are never cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<u64>,
}

impl Route {
    /// The part of `forwardUrl` before the first `:`.
    #[must_use]
    pub fn forward_prefix(&self) -> Option<&str> {
        self.forward_url.split_once(':').map(|(prefix, _)| prefix)
    }

    /// The part of `forwardUrl` after the first `:`.
    #[must_use]
    pub fn forward_remainder(&self) -> Option<&str> {
        self.forward_url.split_once(':').map(|(_, rest)| rest)
    }

    #[must_use]
    pub fn is_file_mount(&self) -> bool {
        self.forward_prefix() == Some("file")
    }

    /// Directory served by a `file://` route.
    #[must_use]
    pub fn file_root(&self) -> Option<&str> {
        self.forward_url.strip_prefix("file://")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CorsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub credentials: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_headers: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vary: Option<String>,
}

impl CorsConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

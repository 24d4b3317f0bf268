//! IP whitelist guard and caller-IP resolution.
//!
//! [`Whitelist`] holds literal addresses and CIDR blocks. When the
//! configured list is non-empty, [`whitelist_guard`] runs in front of
//! every route and rejects callers outside it with `403` and
//! `{"error": "<ip> is not allowed"}`. Entries that parse as neither an
//! address nor a network are kept but never match.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ipnetwork::IpNetwork;

use crate::error::ProxyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistEntry {
    Addr(IpAddr),
    Network(IpNetwork),
    Invalid(String),
}

impl WhitelistEntry {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let parsed = if trimmed.contains('/') {
            trimmed.parse::<IpNetwork>().ok().map(Self::Network)
        } else {
            trimmed.parse::<IpAddr>().ok().map(Self::Addr)
        };
        parsed.unwrap_or_else(|| Self::Invalid(raw.to_string()))
    }

    #[must_use]
    pub fn matches(&self, ip: IpAddr) -> bool {
        match self {
            Self::Addr(addr) => *addr == ip,
            Self::Network(net) => net.contains(ip),
            Self::Invalid(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    #[must_use]
    pub fn new(raw: &[String]) -> Self {
        let entries: Vec<WhitelistEntry> = raw.iter().map(|s| WhitelistEntry::parse(s)).collect();
        for entry in &entries {
            if let WhitelistEntry::Invalid(raw) = entry {
                tracing::warn!(entry = %raw, "whitelist entry is neither an IP nor a CIDR block, it will never match");
            }
        }
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn allows(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.entries.iter().any(|entry| entry.matches(ip))
    }
}

/// Caller address: the socket peer, or the first `X-Forwarded-For` hop
/// (then `X-Real-IP`) when proxy headers are trusted.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        };
        if let Some(ip) = forwarded.or_else(real_ip) {
            return ip.to_canonical();
        }
    }
    peer.ip().to_canonical()
}

#[derive(Debug, Clone)]
pub struct GuardState {
    pub whitelist: Arc<Whitelist>,
    pub trust_proxy_headers: bool,
}

pub async fn whitelist_guard(
    State(guard): State<GuardState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), peer, guard.trust_proxy_headers);
    if guard.whitelist.allows(ip) {
        return next.run(request).await;
    }

    tracing::warn!(
        client_ip = %ip,
        method = %request.method(),
        path = %request.uri().path(),
        "caller rejected by whitelist"
    );
    ProxyError::AccessDenied { ip: ip.to_string() }.into_response()
}

//! Static round-robin backend selection.
//!
//! Each non-discovery route gets one [`RoundRobin`] built at startup from
//! its forward target and the `upstreams` table. The backend list never
//! changes afterwards; only the cursor moves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::model::Route;

/// Expand a route's forward target into its backend list.
///
/// When the prefix before `:` names a non-empty upstream group, every host
/// in the group is joined with the remainder of the target
/// (`pool:/v1` + `http://a:8080` → `http://a:8080/v1`). Otherwise the
/// list is the literal forward target.
#[must_use]
pub fn expand_backends(route: &Route, upstreams: &HashMap<String, Vec<String>>) -> Vec<String> {
    let group = route
        .forward_url
        .split_once(':')
        .and_then(|(prefix, rest)| upstreams.get(prefix).map(|hosts| (hosts, rest)))
        .filter(|(hosts, _)| !hosts.is_empty());

    match group {
        Some((hosts, rest)) => hosts.iter().map(|host| format!("{host}{rest}")).collect(),
        None => vec![route.forward_url.clone()],
    }
}

/// Lock-free round-robin over a fixed, non-empty list of backends.
#[derive(Debug)]
pub struct RoundRobin {
    backends: Vec<String>,
    cursor: AtomicUsize,
}

impl RoundRobin {
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn new(backends: Vec<String>) -> Option<Self> {
        if backends.is_empty() {
            return None;
        }
        Some(Self {
            backends,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Balancer over a route's expanded backends, which are never empty.
    #[must_use]
    pub fn for_route(route: &Route, upstreams: &HashMap<String, Vec<String>>) -> Self {
        Self {
            backends: expand_backends(route, upstreams),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Return the backend under the cursor and advance it.
    pub fn next(&self) -> &str {
        let len = self.backends.len();
        // fetch_update keeps the cursor in 0..len so it never wraps past usize::MAX
        let idx = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        &self.backends[idx]
    }

    #[must_use]
    pub fn backends(&self) -> &[String] {
        &self.backends
    }
}

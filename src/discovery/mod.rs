//! Self-registering service discovery.
//!
//! [`DiscoveryRegistry`] maps a service name to its ordered instances and
//! a rotation cursor. It is mutated from three places: `POST /discovery`
//! registrations ([`handler`]), proxy dispatch failures
//! ([`DiscoveryRegistry::mark_inactive`]), and the background TCP
//! [`heartbeat`]. Every read and write goes through one mutex, which is
//! never held across an `.await`.
//!
//! Instances are never removed. An instance turned off by a failed
//! dispatch comes back either through re-registration or through a
//! successful heartbeat probe.

pub mod handler;
pub mod heartbeat;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::ProxyError;

/// Identity of an instance: `(service, host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InstanceKey {
    pub service: String,
    pub host: String,
    pub port: u16,
}

impl InstanceKey {
    /// `host:port`, with IPv6 literals bracketed.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.service, self.authority())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    #[serde(flatten)]
    pub key: InstanceKey,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    Reactivated,
}

#[derive(Debug, Default)]
struct ServicePool {
    instances: Vec<Instance>,
    cursor: usize,
}

/// Counts reported by `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub services: usize,
    pub instances: usize,
    pub active: usize,
}

#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    services: Mutex<HashMap<String, ServicePool>>,
}

impl DiscoveryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ServicePool>> {
        // Mutations are single writes or pushes, so a poisoned map is still consistent.
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an instance, or reactivate it if the identity already exists.
    pub fn register(&self, service: &str, host: &str, port: i64) -> Result<Registration, ProxyError> {
        if service.is_empty() {
            return Err(ProxyError::Registration("service name is required".into()));
        }
        if host.is_empty() {
            return Err(ProxyError::Registration("service host is required".into()));
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| ProxyError::Registration("service port is invalid".into()))?;

        let mut services = self.lock();
        let pool = services.entry(service.to_string()).or_default();

        if let Some(existing) = pool
            .instances
            .iter_mut()
            .find(|i| i.key.host == host && i.key.port == port)
        {
            existing.active = true;
            return Ok(Registration::Reactivated);
        }

        pool.instances.push(Instance {
            key: InstanceKey {
                service: service.to_string(),
                host: host.to_string(),
                port,
            },
            active: true,
        });
        Ok(Registration::Added)
    }

    /// Pick the next active instance of `service` in rotation.
    ///
    /// The cursor advances before each look, so retries walk the ring in
    /// order starting after the previous pick. At most one full lap is
    /// made.
    pub fn select(&self, service: &str) -> Result<InstanceKey, ProxyError> {
        let mut services = self.lock();
        let no_active = || ProxyError::NoActiveInstance {
            service: service.to_string(),
        };
        let pool = services.get_mut(service).ok_or_else(no_active)?;

        let len = pool.instances.len();
        for _ in 0..len {
            pool.cursor = (pool.cursor + 1) % len;
            let candidate = &pool.instances[pool.cursor];
            if candidate.active {
                return Ok(candidate.key.clone());
            }
        }
        Err(no_active())
    }

    /// Turn an instance off. Returns `false` when it is unknown.
    pub fn mark_inactive(&self, key: &InstanceKey) -> bool {
        self.set_active(key, false).is_some()
    }

    /// Set an instance's health flag, returning the previous value.
    pub fn set_active(&self, key: &InstanceKey, active: bool) -> Option<bool> {
        let mut services = self.lock();
        let instance = services
            .get_mut(&key.service)?
            .instances
            .iter_mut()
            .find(|i| i.key == *key)?;
        Some(std::mem::replace(&mut instance.active, active))
    }

    /// Copy of every instance, grouped by service in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Instance> {
        let services = self.lock();
        let mut names: Vec<&String> = services.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| services[name].instances.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        let services = self.lock();
        let mut summary = RegistrySummary {
            services: services.len(),
            ..RegistrySummary::default()
        };
        for pool in services.values() {
            summary.instances += pool.instances.len();
            summary.active += pool.instances.iter().filter(|i| i.active).count();
        }
        summary
    }
}

//! Periodic TCP liveness probing of registered instances.
//!
//! Every tick, each known instance gets a short TCP connect attempt and
//! its `active` flag is set to the outcome. Probes run concurrently and
//! the registry lock is only taken to snapshot and to apply results.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::{DiscoveryRegistry, InstanceKey};

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

/// Attempt a TCP connection to the instance within `timeout`.
pub async fn probe(key: &InstanceKey, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((key.host.as_str(), key.port))).await,
        Ok(Ok(_))
    )
}

impl DiscoveryRegistry {
    /// Probe every instance once and record the results.
    pub async fn probe_all(&self, probe_timeout: Duration) {
        let mut probes = JoinSet::new();
        for instance in self.snapshot() {
            probes.spawn(async move {
                let alive = probe(&instance.key, probe_timeout).await;
                (instance.key, alive)
            });
        }

        while let Some(joined) = probes.join_next().await {
            let (key, alive) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "heartbeat probe task failed");
                    continue;
                }
            };
            match self.set_active(&key, alive) {
                Some(previous) if previous != alive => {
                    if alive {
                        tracing::info!(instance = %key, "instance passed heartbeat, marked active");
                    } else {
                        tracing::warn!(instance = %key, "instance failed heartbeat, marked inactive");
                    }
                }
                _ => {}
            }
        }
    }

    /// Run heartbeat rounds until `shutdown` fires or its sender is dropped.
    pub async fn run_heartbeat(
        self: Arc<Self>,
        settings: HeartbeatSettings,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(settings.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = settings.interval.as_secs(),
            "discovery heartbeat started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    tracing::debug!("discovery heartbeat shutting down");
                    return;
                }
            }

            let round = self.probe_all(settings.probe_timeout);
            tokio::select! {
                () = round => {}
                _ = shutdown.changed() => {
                    tracing::debug!("discovery heartbeat shutting down mid-round");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_detects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let key = InstanceKey {
            service: "svc".into(),
            host: "127.0.0.1".into(),
            port,
        };
        assert!(probe(&key, Duration::from_secs(1)).await);

        drop(listener);
        assert!(!probe(&key, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn probe_all_resurrects_and_retires() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_port = listener.local_addr().unwrap().port();
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let registry = DiscoveryRegistry::new();
        registry
            .register("svc", "127.0.0.1", i64::from(live_port))
            .unwrap();
        registry
            .register("svc", "127.0.0.1", i64::from(dead_port))
            .unwrap();
        let live = InstanceKey {
            service: "svc".into(),
            host: "127.0.0.1".into(),
            port: live_port,
        };
        registry.mark_inactive(&live);

        registry.probe_all(Duration::from_secs(1)).await;

        let snapshot = registry.snapshot();
        let state = |port: u16| snapshot.iter().find(|i| i.key.port == port).unwrap().active;
        assert!(state(live_port));
        assert!(!state(dead_port));
        drop(listener);
    }

    #[tokio::test]
    async fn heartbeat_stops_on_shutdown() {
        let registry = Arc::new(DiscoveryRegistry::new());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(registry.run_heartbeat(
            HeartbeatSettings {
                interval: Duration::from_millis(10),
                probe_timeout: Duration::from_millis(10),
            },
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("heartbeat did not stop")
            .unwrap();
    }
}

//! System probes: service liveness, tunnel interface, resolver configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, trace};
use warptray_command::CommandRunner;

use crate::error::ControlError;
use crate::types::ConnectionState;

/// Resolver addresses the WARP client installs in DNS-only modes.
pub const DNS_PROXY_ADDRESSES: [&str; 2] = ["127.0.2.2", "127.0.2.3"];

/// How connectivity is observed for the current operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Presence of the virtual network interface.
    Interface,
    /// Loopback DNS proxy in the resolver configuration.
    Resolver,
    /// Nothing observable; the previous state is kept.
    Unavailable,
}

/// Reads connectivity from the host.
#[derive(Clone)]
pub struct SystemProbe {
    runner: CommandRunner,
    interface_name: String,
    resolv_conf: PathBuf,
    timeout: Duration,
}

impl SystemProbe {
    pub fn new(
        runner: CommandRunner,
        interface_name: impl Into<String>,
        resolv_conf: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            interface_name: interface_name.into(),
            resolv_conf: resolv_conf.into(),
            timeout,
        }
    }

    /// Returns `true` if the systemd unit is active.
    pub async fn service_active(&self, service: &str, timeout: Duration) -> bool {
        let res = self
            .runner
            .run("systemctl", &["is-active", "--quiet", service], timeout)
            .await;
        debug!(service, exit_code = res.exit_code, timed_out = res.timed_out, "service check");
        res.succeeded()
    }

    /// Observes the connection using `strategy`. `prior` is returned as-is
    /// when the strategy cannot observe anything.
    pub async fn probe(
        &self,
        strategy: ProbeStrategy,
        prior: ConnectionState,
    ) -> Result<ConnectionState, ControlError> {
        let connected = match strategy {
            ProbeStrategy::Interface => self.interface_present().await?,
            ProbeStrategy::Resolver => self.resolver_redirected().await?,
            ProbeStrategy::Unavailable => {
                trace!(?prior, "no probe for this mode, keeping previous state");
                return Ok(prior);
            }
        };
        Ok(ConnectionState::from_connected(connected))
    }

    async fn interface_present(&self) -> Result<bool, ControlError> {
        let res = self
            .runner
            .run("ip", &["addr", "show", &self.interface_name], self.timeout)
            .await;

        if res.timed_out || res.launch_failed() {
            return Err(ControlError::ProbeUnavailable(format!(
                "could not query interface {}: {}",
                self.interface_name, res.stderr
            )));
        }
        trace!(interface = %self.interface_name, exit_code = res.exit_code, "interface probe");
        Ok(res.exit_code == 0)
    }

    async fn resolver_redirected(&self) -> Result<bool, ControlError> {
        let text = tokio::fs::read_to_string(&self.resolv_conf)
            .await
            .map_err(|e| {
                ControlError::ProbeUnavailable(format!(
                    "could not read {}: {e}",
                    self.resolv_conf.display()
                ))
            })?;
        Ok(resolver_points_at_proxy(&text))
    }
}

/// Returns `true` if the resolver configuration names a WARP DNS proxy.
pub fn resolver_points_at_proxy(text: &str) -> bool {
    DNS_PROXY_ADDRESSES.iter().any(|addr| text.contains(addr))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;
    use crate::testing::FakeWarp;

    fn probe_with(fake: &Arc<FakeWarp>, resolv: impl Into<PathBuf>) -> SystemProbe {
        SystemProbe::new(
            fake.runner(),
            "CloudflareWARP",
            resolv,
            Duration::from_secs(2),
        )
    }

    #[test]
    fn resolver_text_detection() {
        assert!(resolver_points_at_proxy("nameserver 127.0.2.2\nnameserver 127.0.2.3\n"));
        assert!(resolver_points_at_proxy("nameserver 127.0.2.3"));
        assert!(!resolver_points_at_proxy("nameserver 127.0.0.53\noptions edns0"));
    }

    #[tokio::test]
    async fn interface_probe_follows_exit_code() {
        let fake = FakeWarp::new();
        let probe = probe_with(&fake, "/nonexistent");

        let state = probe
            .probe(ProbeStrategy::Interface, ConnectionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(state, ConnectionState::Disconnected);

        fake.world().connected = true;
        let state = probe
            .probe(ProbeStrategy::Interface, ConnectionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(state, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn interface_probe_unavailable_on_launch_failure() {
        let fake = FakeWarp::new();
        fake.world().interface_unavailable = true;
        let probe = probe_with(&fake, "/nonexistent");

        let err = probe
            .probe(ProbeStrategy::Interface, ConnectionState::Connected)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::ProbeUnavailable(_)));
    }

    #[tokio::test]
    async fn resolver_probe_reads_file() {
        let fake = FakeWarp::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# managed by warp-svc\nnameserver 127.0.2.2").unwrap();
        let probe = probe_with(&fake, file.path());

        let state = probe
            .probe(ProbeStrategy::Resolver, ConnectionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(state, ConnectionState::Connected);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn resolver_probe_unreadable_file() {
        let fake = FakeWarp::new();
        let dir = tempfile::tempdir().unwrap();
        let probe = probe_with(&fake, dir.path().join("missing.conf"));

        let err = probe
            .probe(ProbeStrategy::Resolver, ConnectionState::Disconnected)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::ProbeUnavailable(_)));
    }

    #[tokio::test]
    async fn unavailable_strategy_keeps_prior() {
        let fake = FakeWarp::new();
        let probe = probe_with(&fake, "/nonexistent");

        let state = probe
            .probe(ProbeStrategy::Unavailable, ConnectionState::Connected)
            .await
            .unwrap();
        assert_eq!(state, ConnectionState::Connected);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn service_check_uses_systemctl() {
        let fake = FakeWarp::new();
        let probe = probe_with(&fake, "/nonexistent");

        assert!(probe.service_active("warp-svc", Duration::from_secs(3)).await);
        fake.world().service_active = false;
        assert!(!probe.service_active("warp-svc", Duration::from_secs(3)).await);

        let calls = fake.calls();
        assert!(calls[0].matches("systemctl", &["is-active", "--quiet", "warp-svc"]));
    }
}

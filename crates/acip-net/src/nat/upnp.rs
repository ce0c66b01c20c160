//! UPnP/IGD port mapping, consumed by the quality probe's UPnP sub-probe.
//!
//! Uses `igd-next` to request port forwarding from the local gateway
//! router, the same crate and call shape the teacher's (then-stubbed) UPnP
//! module already depended on.

use crate::error::{ErrorKind, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Budget for the SSDP M-SEARCH gateway discovery (spec §4.1).
pub const GATEWAY_SEARCH_BUDGET: Duration = Duration::from_secs(2);

/// A discovered gateway and the external address it reports.
#[derive(Debug, Clone)]
pub struct GatewayInfo {
    /// The gateway's reported external IP, if it could be queried.
    pub external_addr: Option<IpAddr>,
}

/// UPnP IGD capability consumed by the quality probe.
#[allow(async_fn_in_trait)]
pub trait Upnp: Send + Sync {
    /// Search for a gateway on the local network, bounded by
    /// [`GATEWAY_SEARCH_BUDGET`]. Returns `None` if none responds — this is
    /// not an error, just "no UPnP available" (spec §4.1).
    async fn probe(&self) -> Option<GatewayInfo>;

    /// Request a port mapping: forward `external_port` to this host's
    /// `local_port` for `ttl` seconds (`0` = permanent lease). The
    /// collaborator resolves its own LAN address.
    async fn map_port(&self, local_port: u16, external_port: u16, ttl: u32) -> Result<u16>;
}

/// Discover the primary local IP address (non-loopback, non-link-local) by
/// connecting a UDP socket to a well-known external address and inspecting
/// the route it picks. No packets need to actually be delivered.
fn local_lan_ip() -> Result<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| ErrorKind::ProbeFailed(format!("bind failed: {e}")))?;
    socket
        .connect("8.8.8.8:80")
        .map_err(|e| ErrorKind::ProbeFailed(format!("connect failed: {e}")))?;
    socket
        .local_addr()
        .map(|a| a.ip())
        .map_err(|e| ErrorKind::ProbeFailed(format!("local_addr failed: {e}")))
}

/// Real UPnP client backed by `igd-next`'s tokio gateway search.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgdUpnp;

impl Upnp for IgdUpnp {
    async fn probe(&self) -> Option<GatewayInfo> {
        let search = igd_next::aio::tokio::search_gateway(igd_next::SearchOptions {
            timeout: Some(GATEWAY_SEARCH_BUDGET),
            ..Default::default()
        });
        let gateway = match tokio::time::timeout(GATEWAY_SEARCH_BUDGET, search).await {
            Ok(Ok(gateway)) => gateway,
            Ok(Err(e)) => {
                tracing::debug!("UPnP gateway search failed: {e}");
                return None;
            }
            Err(_) => {
                tracing::debug!("UPnP gateway search timed out");
                return None;
            }
        };

        let external_addr = gateway.get_external_ip().await.ok();
        tracing::debug!(?external_addr, "UPnP gateway discovered");
        Some(GatewayInfo { external_addr })
    }

    async fn map_port(&self, local_port: u16, external_port: u16, ttl: u32) -> Result<u16> {
        let gateway = igd_next::aio::tokio::search_gateway(igd_next::SearchOptions {
            timeout: Some(GATEWAY_SEARCH_BUDGET),
            ..Default::default()
        })
        .await
        .map_err(|e| ErrorKind::ProbeFailed(format!("UPnP gateway not found: {e}")))?;

        let internal_addr = SocketAddr::new(local_lan_ip()?, local_port);

        gateway
            .add_port(
                igd_next::PortMappingProtocol::UDP,
                external_port,
                internal_addr,
                ttl,
                "acip session bootstrap",
            )
            .await
            .map_err(|e| {
                tracing::warn!("UPnP port mapping failed: {e}");
                ErrorKind::ProbeFailed(format!("UPnP port mapping failed: {e}"))
            })?;

        tracing::info!(external_port, %internal_addr, "UPnP port mapped");
        Ok(external_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A fake UPnP collaborator, for driving the quality probe in tests
    /// without a real gateway on the network.
    pub struct FakeUpnp {
        pub available: bool,
        pub mapped_port: u16,
        pub map_was_called: AtomicBool,
    }

    impl Upnp for FakeUpnp {
        async fn probe(&self) -> Option<GatewayInfo> {
            self.available.then_some(GatewayInfo { external_addr: None })
        }

        async fn map_port(&self, _local_port: u16, _external: u16, _ttl: u32) -> Result<u16> {
            self.map_was_called.store(true, Ordering::SeqCst);
            if self.available {
                Ok(self.mapped_port)
            } else {
                Err(ErrorKind::ProbeFailed("no gateway".into()))
            }
        }
    }

    #[tokio::test]
    async fn fake_upnp_reports_unavailable_when_configured() {
        let fake = FakeUpnp {
            available: false,
            mapped_port: 0,
            map_was_called: AtomicBool::new(false),
        };
        assert!(fake.probe().await.is_none());
    }

    #[tokio::test]
    async fn fake_upnp_maps_port_when_available() {
        let fake = FakeUpnp {
            available: true,
            mapped_port: 41000,
            map_was_called: AtomicBool::new(false),
        };
        let port = fake.map_port(9090, 41000, 0).await.unwrap();
        assert_eq!(port, 41000);
        assert!(fake.map_was_called.load(Ordering::SeqCst));
    }
}

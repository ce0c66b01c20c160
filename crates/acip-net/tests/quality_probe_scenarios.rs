//! Multi-task scenarios for the quality probe that need a real clock race
//! or a full sub-probe mix, rather than a single synchronous assertion.

use acip_net::cancel::CancelToken;
use acip_net::clock::MockClock;
use acip_net::nat::{
    BandwidthProbe, ConnectionType, GatewayInfo, QualityProbe, Stun, StunResult, Tier, Upnp,
};
use acip_net::{ErrorKind, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// STUN double that never resolves, so the probe's only way out is its
/// deadline.
struct HangingStun;
impl Stun for HangingStun {
    async fn binding_request(&self, _server: SocketAddr, _local_port: u16) -> Result<StunResult> {
        std::future::pending().await
    }
}

struct NoUpnp;
impl Upnp for NoUpnp {
    async fn probe(&self) -> Option<GatewayInfo> {
        None
    }
    async fn map_port(&self, _: u16, _: u16, _: u32) -> Result<u16> {
        Err(ErrorKind::ProbeFailed("no gateway".into()))
    }
}

struct NoBandwidth;
impl BandwidthProbe for NoBandwidth {
    async fn estimate_upload_kbps(&self, _window: Duration) -> Option<u32> {
        None
    }
}

#[tokio::test]
async fn deadline_with_every_subprobe_hanging_yields_probe_failed() {
    let stun = HangingStun;
    let upnp = NoUpnp;
    let bw = NoBandwidth;
    let clock = Arc::new(MockClock::new(0));
    let probe = QualityProbe::new(&stun, &upnp, Some(&bw), clock.as_ref());
    let cancel = CancelToken::new();

    let probe_task = probe.probe(
        "1.2.3.4:3478".parse().unwrap(),
        "1.2.3.5:3478".parse().unwrap(),
        9090,
        &cancel,
    );
    let clock_driver = {
        let clock = clock.clone();
        async move {
            for _ in 0..50 {
                tokio::task::yield_now().await;
            }
            clock.advance(acip_net::nat::probe::DEFAULT_PROBE_DEADLINE_MS + 1);
        }
    };

    let (result, _) = tokio::join!(probe_task, clock_driver);
    assert!(matches!(result, Err(ErrorKind::ProbeFailed(_))));
}

/// A full-cone NAT with no public IP, but with a UPnP gateway available: the
/// probe should prefer UPnP as the connection type over bare STUN, and the
/// comparator elsewhere (C2) lets that availability break ties.
struct ConeStun;
impl Stun for ConeStun {
    async fn binding_request(&self, server: SocketAddr, _local_port: u16) -> Result<StunResult> {
        // Both servers see the same mapped port, distinct from local_port.
        let _ = server;
        Ok(StunResult {
            mapped_addr: SocketAddr::new("203.0.113.20".parse().unwrap(), 41000),
            rtt_ms: 25,
        })
    }
}

struct FakeUpnp {
    mapped_port: u16,
}
impl Upnp for FakeUpnp {
    async fn probe(&self) -> Option<GatewayInfo> {
        Some(GatewayInfo {
            external_addr: Some("198.51.100.1".parse().unwrap()),
        })
    }
    async fn map_port(&self, _local_port: u16, _external: u16, _ttl: u32) -> Result<u16> {
        Ok(self.mapped_port)
    }
}

#[tokio::test]
async fn full_cone_with_upnp_prefers_upnp_connection_type() {
    let stun = ConeStun;
    let upnp = FakeUpnp { mapped_port: 41000 };
    let bw = NoBandwidth;
    let clock = MockClock::new(0);
    let probe = QualityProbe::new(&stun, &upnp, Some(&bw), &clock);
    let cancel = CancelToken::new();

    let quality = probe
        .probe(
            "1.2.3.4:3478".parse().unwrap(),
            "1.2.3.5:3478".parse().unwrap(),
            9090,
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(quality.tier, Tier::FullCone);
    assert!(!quality.has_public_ip);
    assert!(quality.upnp_available);
    assert_eq!(quality.connection_type, ConnectionType::Upnp);
    assert_eq!(quality.upnp_mapped_port, 41000);
}

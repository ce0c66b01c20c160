//! Session Controller (C8) — dispatches on participant count, drives the
//! appropriate pipeline, and exposes `status`/`cancel`/`on_inbound` to the
//! caller (spec §4.8).

use crate::addressing::LOOPBACK_FALLBACK;
use crate::config::BootstrapConfig;
use crate::decision::HostDecision;
use crate::dissemination::{run_follower_dissemination, run_leader_dissemination};
use crate::ids::{ParticipantId, SessionId};
use crate::negotiation::{run_pairwise, NegotiationContext};
use crate::ring::build_ring;
use crate::stats::{run_follower_round, run_leader_round};
use acip_net::clock::Clock;
use acip_net::nat::{BandwidthProbe, ConnectionType, QualityProbe, Stun, Upnp};
use acip_net::{CancelToken, ErrorKind, Result, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Observable state of an in-flight or concluded bootstrap (spec §4.8).
#[derive(Debug, Clone)]
pub enum Status {
    /// Bootstrap is still running.
    Running,
    /// Bootstrap concluded with a host decision.
    Complete(HostDecision),
    /// Bootstrap failed.
    Failed(ErrorKind),
}

/// Collaborators a [`Bootstrap::start`] call needs, bundled so the call site
/// stays readable despite the handful of type parameters C1 drives.
pub struct Collaborators<S, U, B, C, T> {
    /// STUN binding collaborator.
    pub stun: Arc<S>,
    /// UPnP IGD collaborator.
    pub upnp: Arc<U>,
    /// Optional bandwidth-estimation collaborator.
    pub bandwidth: Option<Arc<B>>,
    /// Wall-clock collaborator.
    pub clock: Arc<C>,
    /// Control-channel transport.
    pub transport: Arc<T>,
    /// Primary STUN reference server.
    pub primary_stun_server: SocketAddr,
    /// Secondary STUN reference server (for NAT-behaviour classification).
    pub secondary_stun_server: SocketAddr,
    /// Local UDP port the probes bind from.
    pub local_port: u16,
}

/// A handle to an in-flight bootstrap. Cloneable; every clone observes the
/// same underlying run.
#[derive(Clone)]
pub struct Handle {
    cancel: CancelToken,
    status: Arc<Mutex<Status>>,
}

impl Handle {
    /// Current observable state.
    pub async fn status(&self) -> Status {
        self.status.lock().await.clone()
    }

    /// Request cancellation; the run transitions to `Failed(Cancelled)`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Present for API parity with collaborators that deliver inbound bytes
    /// out of band rather than through `Transport::recv` directly. Every
    /// transport shipped in this crate already delivers inbound messages
    /// through `Transport::recv`, so this is currently a no-op.
    pub fn on_inbound(&self, _bytes: Vec<u8>) {}
}

/// Entry point for session bootstrap.
pub struct Bootstrap;

impl Bootstrap {
    /// Start a bootstrap run. Dispatches on `members.len()` per spec §4.8:
    /// `N == 1` trivially self-hosts, `N == 2` drives the pairwise
    /// negotiator (C3), `N >= 3` builds a ring (C4) and runs the leader or
    /// follower consensus path depending on ring order.
    ///
    /// `is_leader` is not taken on faith for the `N >= 3` case: leadership
    /// there is always recomputed from the deterministic ring order so every
    /// participant's controller agrees on the same leader regardless of what
    /// the caller believes.
    #[allow(clippy::too_many_arguments)]
    pub fn start<S, U, B, C, T>(
        session_id: SessionId,
        self_id: ParticipantId,
        members: Vec<ParticipantId>,
        is_leader: bool,
        config: BootstrapConfig,
        collaborators: Collaborators<S, U, B, C, T>,
    ) -> Handle
    where
        S: Stun + Send + Sync + 'static,
        U: Upnp + Send + Sync + 'static,
        B: BandwidthProbe + Send + Sync + 'static,
        C: Clock + Send + Sync + 'static,
        T: Transport + Send + Sync + 'static,
    {
        let cancel = CancelToken::new();
        let status = Arc::new(Mutex::new(Status::Running));
        let handle = Handle {
            cancel: cancel.clone(),
            status: status.clone(),
        };

        tokio::spawn(async move {
            let result = run(
                session_id,
                self_id,
                members,
                is_leader,
                config,
                collaborators,
                cancel,
            )
            .await;
            match &result {
                Ok(decision) => tracing::info!(host = ?decision.host_id, "bootstrap complete"),
                Err(err) => tracing::warn!(?err, "bootstrap failed"),
            }
            let mut guard = status.lock().await;
            *guard = match result {
                Ok(decision) => Status::Complete(decision),
                Err(err) => Status::Failed(err),
            };
        });

        handle
    }
}

#[allow(clippy::too_many_arguments)]
async fn run<S, U, B, C, T>(
    session_id: SessionId,
    self_id: ParticipantId,
    members: Vec<ParticipantId>,
    is_leader: bool,
    config: BootstrapConfig,
    collaborators: Collaborators<S, U, B, C, T>,
    cancel: CancelToken,
) -> Result<HostDecision>
where
    S: Stun,
    U: Upnp,
    B: BandwidthProbe,
    C: Clock,
    T: Transport,
{
    let Collaborators {
        stun,
        upnp,
        bandwidth,
        clock,
        transport,
        primary_stun_server,
        secondary_stun_server,
        local_port,
    } = collaborators;

    tracing::debug!(participants = members.len(), "dispatching bootstrap run");
    match members.len() {
        0 => Err(ErrorKind::InvalidParam(
            "members must include at least self".into(),
        )),
        1 => {
            let now_ms = clock.now_ms();
            Ok(HostDecision {
                host_id: self_id,
                backup_id: self_id,
                host_address: LOOPBACK_FALLBACK.to_string(),
                host_port: config.host_default_port,
                backup_address: LOOPBACK_FALLBACK.to_string(),
                backup_port: config.host_default_port,
                connection_type: ConnectionType::DirectPublic,
                elected_at_ms: now_ms,
                generation: 1,
            })
        }
        2 => {
            let peer_id = *members.iter().find(|&&m| m != self_id).ok_or_else(|| {
                ErrorKind::InvalidParam("two-party bootstrap requires a distinct peer id".into())
            })?;
            let probe = QualityProbe::new(
                stun.as_ref(),
                upnp.as_ref(),
                bandwidth.as_deref(),
                clock.as_ref(),
            );
            let mut ctx = NegotiationContext::new(session_id, self_id, peer_id);
            run_pairwise(
                &mut ctx,
                &probe,
                primary_stun_server,
                secondary_stun_server,
                local_port,
                transport.as_ref(),
                clock.as_ref(),
                &cancel,
                &config,
            )
            .await
        }
        _ => {
            let _ = is_leader;
            let mut ring = build_ring(session_id, self_id, &members);
            let probe = QualityProbe::new(
                stun.as_ref(),
                upnp.as_ref(),
                bandwidth.as_deref(),
                clock.as_ref(),
            );
            let our_quality = probe
                .probe(primary_stun_server, secondary_stun_server, local_port, &cancel)
                .await?;

            if ring.is_leader() {
                tracing::debug!("acting as ring leader for this session");
                let decision = run_leader_round(
                    &mut ring,
                    &our_quality,
                    transport.as_ref(),
                    clock.as_ref(),
                    &cancel,
                    &config,
                )
                .await?;
                run_leader_dissemination(
                    &ring,
                    &decision,
                    transport.as_ref(),
                    clock.as_ref(),
                    &cancel,
                    &config,
                )
                .await
            } else {
                tracing::debug!("acting as ring follower for this session");
                run_follower_round(
                    &ring,
                    &our_quality,
                    transport.as_ref(),
                    clock.as_ref(),
                    &cancel,
                    &config,
                )
                .await?;
                run_follower_dissemination(&ring, transport.as_ref(), &cancel).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acip_net::clock::MockClock;
    use acip_net::nat::{GatewayInfo, StunResult};
    use acip_net::InMemoryTransport;
    use std::time::Duration;

    struct FixedStun;
    impl Stun for FixedStun {
        async fn binding_request(&self, _server: SocketAddr, local_port: u16) -> Result<StunResult> {
            Ok(StunResult {
                mapped_addr: SocketAddr::new("203.0.113.1".parse().unwrap(), local_port),
                rtt_ms: 15,
            })
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

    fn collaborators(
        transport: Arc<InMemoryTransport>,
        clock: Arc<MockClock>,
        local_port: u16,
    ) -> Collaborators<FixedStun, NoUpnp, NoBandwidth, MockClock, InMemoryTransport> {
        Collaborators {
            stun: Arc::new(FixedStun),
            upnp: Arc::new(NoUpnp),
            bandwidth: None,
            clock,
            transport,
            primary_stun_server: "1.2.3.4:3478".parse().unwrap(),
            secondary_stun_server: "1.2.3.5:3478".parse().unwrap(),
            local_port,
        }
    }

    #[tokio::test]
    async fn single_participant_self_hosts_trivially() {
        let transports = InMemoryTransport::mesh(&[[1u8; 16]]);
        let clock = Arc::new(MockClock::new(0));
        let handle = Bootstrap::start(
            [0u8; 16],
            [1u8; 16],
            vec![[1u8; 16]],
            true,
            BootstrapConfig::default(),
            collaborators(transports[0].clone(), clock, 9090),
        );

        let mut status = handle.status().await;
        let mut spins = 0;
        while matches!(status, Status::Running) && spins < 1000 {
            tokio::task::yield_now().await;
            status = handle.status().await;
            spins += 1;
        }
        match status {
            Status::Complete(decision) => assert_eq!(decision.host_id, [1u8; 16]),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn three_participants_elect_a_host() {
        let ids = [[1u8; 16], [2u8; 16], [3u8; 16]];
        let transports = InMemoryTransport::mesh(&ids);
        let clock = Arc::new(MockClock::new(0));
        let config = BootstrapConfig::default();

        let handles: Vec<Handle> = ids
            .iter()
            .zip(transports.iter())
            .enumerate()
            .map(|(i, (&id, transport))| {
                Bootstrap::start(
                    [9u8; 16],
                    id,
                    ids.to_vec(),
                    i == 0,
                    config,
                    collaborators(transport.clone(), clock.clone(), 9090 + i as u16),
                )
            })
            .collect();

        for handle in &handles {
            let mut status = handle.status().await;
            let mut spins = 0;
            while matches!(status, Status::Running) && spins < 10_000 {
                tokio::task::yield_now().await;
                status = handle.status().await;
                spins += 1;
            }
            match status {
                Status::Complete(decision) => assert_eq!(decision.host_id, ids[0]),
                other => panic!("expected Complete, got {other:?}"),
            }
        }
    }
}

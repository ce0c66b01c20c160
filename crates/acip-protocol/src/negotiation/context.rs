//! `NegotiationContext` and the pure state transitions of the pairwise
//! negotiator (C3) — spec §3, §4.3.

use crate::addressing::resolve_address;
use crate::decision::HostDecision;
use crate::ids::{ParticipantId, SessionId};
use crate::wire::NegotiateState;
use acip_net::nat::{compare, NatQuality};
use acip_net::ErrorKind;

/// Per-session state for the two-party negotiator.
#[derive(Debug, Clone)]
pub struct NegotiationContext {
    /// Session this negotiation belongs to.
    pub session_id: SessionId,
    /// This process's own id.
    pub self_id: ParticipantId,
    /// The other participant's id.
    pub peer_id: ParticipantId,
    /// `true` for exactly one of the two peers (spec §9: forced `self_id < peer_id`).
    pub is_initiator: bool,
    /// Our own measured quality, once C1 finishes.
    pub our_quality: Option<NatQuality>,
    /// The peer's reported quality, once received.
    pub peer_quality: Option<NatQuality>,
    /// Current state.
    pub state: NegotiateState,
    /// The final decision, once `state == Complete`.
    pub result: Option<HostDecision>,
    /// The failure cause, once `state == Failed`.
    pub error: Option<ErrorKind>,
}

impl NegotiationContext {
    /// Create a fresh context. `is_initiator` is derived, not passed in, so
    /// callers can't accidentally construct a pair where both sides (or
    /// neither) see themselves as initiator (spec §9 Open Questions).
    pub fn new(session_id: SessionId, self_id: ParticipantId, peer_id: ParticipantId) -> Self {
        Self {
            session_id,
            self_id,
            peer_id,
            is_initiator: self_id < peer_id,
            our_quality: None,
            peer_quality: None,
            state: NegotiateState::Init,
            result: None,
            error: None,
        }
    }

    /// `INIT --startDetection--> DETECTING_NAT`.
    pub fn start_detection(&mut self) {
        self.state = NegotiateState::DetectingNat;
    }

    /// Our own C1 measurement finished. Moves to `COMPARING` if the peer's
    /// quality is already known, else `WAITING_PEER`.
    pub fn on_our_quality_ready(&mut self, quality: NatQuality, default_port: u16, now_ms: u64) {
        self.our_quality = Some(quality);
        if self.peer_quality.is_some() {
            self.compare_and_resolve(default_port, now_ms);
        } else {
            self.state = NegotiateState::WaitingPeer;
        }
    }

    /// A `QUALITY_OFFER` arrived from the peer. Idempotent under duplicate
    /// offers with identical contents; a differing duplicate is a protocol
    /// conflict (spec §4.3).
    pub fn on_peer_quality_received(&mut self, quality: NatQuality, default_port: u16, now_ms: u64) {
        if let Some(existing) = &self.peer_quality {
            if existing == &quality {
                return; // duplicate, identical -- accept silently
            }
            self.fail(ErrorKind::ProtocolConflict(
                "peer sent two different NatQuality offers in the same session".into(),
            ));
            return;
        }
        self.peer_quality = Some(quality);
        if self.our_quality.is_some() {
            self.compare_and_resolve(default_port, now_ms);
        }
    }

    fn compare_and_resolve(&mut self, default_port: u16, now_ms: u64) {
        self.state = NegotiateState::Comparing;
        let ours = self.our_quality.as_ref().expect("our_quality set before compare");
        let theirs = self.peer_quality.as_ref().expect("peer_quality set before compare");
        let ordering = compare(ours, theirs, self.is_initiator);

        let we_host = ordering < 0;
        self.state = if we_host {
            NegotiateState::WeHost
        } else {
            NegotiateState::TheyHost
        };

        let hosting_quality = if we_host { ours } else { theirs };
        let (host_address, host_port, connection_type) =
            resolve_address(hosting_quality, default_port);
        let host_id = if we_host { self.self_id } else { self.peer_id };

        self.result = Some(HostDecision {
            host_id,
            backup_id: host_id,
            host_address: host_address.clone(),
            host_port,
            backup_address: host_address,
            backup_port: host_port,
            connection_type,
            elected_at_ms: now_ms,
            generation: 1,
        });
        self.state = NegotiateState::Complete;
    }

    /// Transition to `FAILED`, recording the cause.
    pub fn fail(&mut self, err: ErrorKind) {
        self.error = Some(err);
        self.state = NegotiateState::Failed;
    }

    /// Whether this context has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, NegotiateState::Complete | NegotiateState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acip_net::nat::{ConnectionType, Tier};

    fn quality(tier: Tier, addr: &str) -> NatQuality {
        NatQuality {
            tier,
            upload_kbps: 1_000,
            rtt_ms: 20,
            stun_probe_success_pct: 100,
            public_address: addr.into(),
            public_port: 9090,
            has_public_ip: tier == Tier::Public,
            upnp_available: false,
            upnp_mapped_port: 0,
            connection_type: if tier == Tier::Public {
                ConnectionType::DirectPublic
            } else {
                ConnectionType::Stun
            },
            measurement_time_ms: 0,
            measurement_window_ms: 0,
            detection_complete: true,
        }
    }

    #[test]
    fn is_initiator_derived_from_id_order() {
        let ctx = NegotiationContext::new([0u8; 16], [0x01; 16], [0x02; 16]);
        assert!(ctx.is_initiator);
        let ctx2 = NegotiationContext::new([0u8; 16], [0x02; 16], [0x01; 16]);
        assert!(!ctx2.is_initiator);
    }

    #[test]
    fn our_quality_first_then_peer_completes() {
        let mut ctx = NegotiationContext::new([0u8; 16], [0x01; 16], [0x02; 16]);
        ctx.start_detection();
        ctx.on_our_quality_ready(quality(Tier::Public, "203.0.113.1"), 9090, 1_000);
        assert_eq!(ctx.state, NegotiateState::WaitingPeer);
        ctx.on_peer_quality_received(quality(Tier::PortRestricted, "203.0.113.2"), 9090, 2_000);
        assert_eq!(ctx.state, NegotiateState::Complete);
        assert_eq!(ctx.result.unwrap().host_id, [0x01; 16]);
    }

    #[test]
    fn peer_quality_first_then_ours_completes() {
        let mut ctx = NegotiationContext::new([0u8; 16], [0x01; 16], [0x02; 16]);
        ctx.start_detection();
        ctx.on_peer_quality_received(quality(Tier::PortRestricted, "203.0.113.2"), 9090, 1_000);
        assert_eq!(ctx.state, NegotiateState::DetectingNat);
        ctx.on_our_quality_ready(quality(Tier::Public, "203.0.113.1"), 9090, 2_000);
        assert_eq!(ctx.state, NegotiateState::Complete);
    }

    #[test]
    fn duplicate_identical_offer_is_accepted_silently() {
        let mut ctx = NegotiationContext::new([0u8; 16], [0x01; 16], [0x02; 16]);
        let q = quality(Tier::PortRestricted, "203.0.113.2");
        ctx.on_peer_quality_received(q.clone(), 9090, 1_000);
        ctx.on_peer_quality_received(q, 9090, 1_000);
        assert_ne!(ctx.state, NegotiateState::Failed);
    }

    #[test]
    fn conflicting_duplicate_offer_fails() {
        let mut ctx = NegotiationContext::new([0u8; 16], [0x01; 16], [0x02; 16]);
        ctx.on_peer_quality_received(quality(Tier::PortRestricted, "203.0.113.2"), 9090, 1_000);
        ctx.on_peer_quality_received(quality(Tier::Public, "203.0.113.3"), 9090, 1_000);
        assert_eq!(ctx.state, NegotiateState::Failed);
        assert!(matches!(ctx.error, Some(ErrorKind::ProtocolConflict(_))));
    }
}

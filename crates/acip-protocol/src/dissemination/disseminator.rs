//! Result Disseminator (C7) — leader announcement + follower ack (spec §4.7).

use crate::decision::HostDecision;
use crate::ids::ParticipantId;
use crate::ring::RingContext;
use crate::stats::round::ElectionRound;
use crate::wire::messages::{AckStatus, RingElectionResult, StatsAck};
use crate::wire::{
    decode_ring_election_result, decode_stats_ack, encode_ring_election_result, encode_stats_ack,
};
use acip_net::clock::Clock;
use acip_net::nat::ConnectionType;
use acip_net::{CancelToken, ErrorKind, Result, Transport};
use bytes::BytesMut;
use std::collections::HashSet;

/// Announce `decision` to every ring member and collect `STATS_ACK`s until a
/// strict majority has acknowledged `Ok`, retransmitting to un-acked members
/// every `config.dissemination_retry_interval_ms` up to
/// `config.max_dissemination_retries` times. Fails with
/// `ErrorKind::DisseminationFailed` if the dissemination deadline passes
/// first (spec §4.7).
pub async fn run_leader_dissemination<T, C>(
    ring: &RingContext,
    decision: &HostDecision,
    transport: &T,
    clock: &C,
    cancel: &CancelToken,
    config: &crate::config::BootstrapConfig,
) -> Result<HostDecision>
where
    T: Transport,
    C: Clock,
{
    let deadline_ms = clock.now_ms() + config.dissemination_deadline_ms;
    let members: Vec<ParticipantId> = ring
        .members
        .iter()
        .copied()
        .filter(|&m| m != ring.self_id)
        .collect();
    let needed = ElectionRound::quorum_needed(ring.members.len());
    let mut acked: HashSet<ParticipantId> = HashSet::new();
    acked.insert(ring.self_id);

    let result_msg = RingElectionResult {
        session_id: ring.session_id,
        leader_id: ring.self_id,
        round_id: decision.generation,
        host_id: decision.host_id,
        host_address: decision.host_address.clone(),
        host_port: decision.host_port,
        backup_id: decision.backup_id,
        backup_address: decision.backup_address.clone(),
        backup_port: decision.backup_port,
        elected_at_ms: decision.elected_at_ms,
        num_participants: ring.members.len().min(u8::MAX as usize) as u8,
    };
    let mut buf = BytesMut::new();
    encode_ring_election_result(&mut buf, &result_msg);
    let payload = buf.to_vec();

    for &m in &members {
        transport.send(m, payload.clone()).await?;
    }
    tracing::debug!(round_id = decision.generation, needed, "announced election result to ring");

    let mut attempt = 0u8;
    let mut next_retry_ms = clock.now_ms() + config.dissemination_retry_interval_ms;

    while acked.len() < needed {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ErrorKind::Cancelled),
            _ = clock.sleep_until(deadline_ms) => break,
            _ = clock.sleep_until(next_retry_ms), if attempt < config.max_dissemination_retries => {
                attempt += 1;
                next_retry_ms = clock.now_ms() + config.dissemination_retry_interval_ms;
                tracing::debug!(attempt, acked = acked.len(), needed, "retransmitting election result");
                for &m in members.iter().filter(|m| !acked.contains(m)) {
                    transport.send(m, payload.clone()).await?;
                }
            }
            recv = transport.recv() => {
                match recv {
                    Ok((sender, bytes)) => {
                        if let Ok(ack) = decode_stats_ack(&mut bytes.as_slice()) {
                            if ack.session_id == ring.session_id
                                && ack.round_id == decision.generation
                                && ack.ack_status == AckStatus::Ok
                            {
                                acked.insert(sender);
                            }
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    if acked.len() >= needed {
        tracing::info!(acked = acked.len(), needed, "dissemination reached quorum");
        Ok(decision.clone())
    } else {
        tracing::warn!(acked = acked.len(), needed, "dissemination deadline passed without quorum");
        Err(ErrorKind::DisseminationFailed {
            acked: acked.len(),
            needed,
        })
    }
}

/// Wait for the leader's `RING_ELECTION_RESULT`, persist it, and reply with
/// a `STATS_ACK` (spec §4.7). The `connection_type` on the reconstructed
/// decision is inferred conservatively as `Stun`, since the wire message
/// carries only the host's address, not how each individual follower reaches
/// it.
pub async fn run_follower_dissemination<T>(
    ring: &RingContext,
    transport: &T,
    cancel: &CancelToken,
) -> Result<HostDecision>
where
    T: Transport,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ErrorKind::Cancelled),
            recv = transport.recv() => {
                let (sender, bytes) = recv?;
                if sender != ring.leader_id() {
                    continue;
                }
                let msg = match decode_ring_election_result(&mut bytes.as_slice()) {
                    Ok(m) if m.session_id == ring.session_id => m,
                    _ => continue,
                };

                let decision = HostDecision {
                    host_id: msg.host_id,
                    backup_id: msg.backup_id,
                    host_address: msg.host_address.clone(),
                    host_port: msg.host_port,
                    backup_address: msg.backup_address.clone(),
                    backup_port: msg.backup_port,
                    connection_type: ConnectionType::Stun,
                    elected_at_ms: msg.elected_at_ms,
                    generation: msg.round_id,
                };

                let ack = StatsAck {
                    session_id: ring.session_id,
                    participant_id: ring.self_id,
                    round_id: msg.round_id,
                    ack_status: AckStatus::Ok,
                    stored_host_id: msg.host_id,
                    stored_backup_id: msg.backup_id,
                };
                let mut buf = BytesMut::new();
                encode_stats_ack(&mut buf, &ack);
                transport.send(msg.leader_id, buf.to_vec()).await?;
                tracing::debug!(host = ?decision.host_id, "acked election result");

                return Ok(decision);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootstrapConfig;
    use crate::ring::build_ring;
    use acip_net::clock::MockClock;
    use acip_net::InMemoryTransport;

    fn decision(generation: u32) -> HostDecision {
        HostDecision {
            host_id: [1u8; 16],
            backup_id: [2u8; 16],
            host_address: "203.0.113.1".into(),
            host_port: 9090,
            backup_address: "203.0.113.2".into(),
            backup_port: 9091,
            connection_type: ConnectionType::DirectPublic,
            elected_at_ms: 1_000,
            generation,
        }
    }

    #[tokio::test]
    async fn majority_ack_completes_dissemination() {
        let ids = [[1u8; 16], [2u8; 16], [3u8; 16]];
        let transports = InMemoryTransport::mesh(&ids);
        let clock = MockClock::new(0);
        let config = BootstrapConfig::default();

        let leader_ring = build_ring([0u8; 16], ids[0], &ids);
        let follower_ring_b = build_ring([0u8; 16], ids[1], &ids);
        let follower_ring_c = build_ring([0u8; 16], ids[2], &ids);

        let leader_transport = transports[0].clone();
        let b_transport = transports[1].clone();
        let c_transport = transports[2].clone();

        let leader_task = {
            let clock = clock.clone();
            let config = config.clone();
            let d = decision(1);
            async move {
                run_leader_dissemination(
                    &leader_ring,
                    &d,
                    leader_transport.as_ref(),
                    &clock,
                    &CancelToken::new(),
                    &config,
                )
                .await
            }
        };
        let b_task = async move {
            run_follower_dissemination(&follower_ring_b, b_transport.as_ref(), &CancelToken::new()).await
        };
        let c_task = async move {
            run_follower_dissemination(&follower_ring_c, c_transport.as_ref(), &CancelToken::new()).await
        };

        let (leader_result, b_result, c_result) = tokio::join!(leader_task, b_task, c_task);
        let final_decision = leader_result.unwrap();
        assert_eq!(final_decision.host_id, [1u8; 16]);
        assert_eq!(b_result.unwrap().host_id, [1u8; 16]);
        assert_eq!(c_result.unwrap().host_id, [1u8; 16]);
    }
}

//! Stats Collector (C5) — leader round orchestration and follower
//! participation (spec §4.5).

use crate::config::BootstrapConfig;
use crate::decision::HostDecision;
use crate::elector::elect;
use crate::ids::ParticipantId;
use crate::ring::RingContext;
use crate::stats::round::{ElectionRound, RoundState};
use crate::wire::messages::{StatsCollectionStart, StatsUpdate};
use crate::wire::{
    decode_stats_collection_start, decode_stats_update, encode_stats_collection_start,
    encode_stats_update,
};
use acip_net::clock::Clock;
use acip_net::nat::NatQuality;
use acip_net::{CancelToken, ErrorKind, Result, Transport};
use bytes::BytesMut;

/// Run one stats-collection round as leader: broadcast `STATS_COLLECTION_START`,
/// gather `STATS_UPDATE`s until quorum or the round deadline, retrying up to
/// `config.max_round_retries` times (bumping `ring.generation` each time)
/// before failing with `ErrorKind::InsufficientQuorum`.
pub async fn run_leader_round<T, C>(
    ring: &mut RingContext,
    our_quality: &NatQuality,
    transport: &T,
    clock: &C,
    cancel: &CancelToken,
    config: &BootstrapConfig,
) -> Result<HostDecision>
where
    T: Transport,
    C: Clock,
{
    let mut attempt = 0u8;
    loop {
        ring.round = RoundState::Collecting;
        let round_id = ring.generation;
        let deadline_ms = clock.now_ms() + config.stats_round_deadline_ms;
        tracing::debug!(round_id, attempt, "starting stats collection round as leader");

        let start = StatsCollectionStart {
            session_id: ring.session_id,
            initiator_id: ring.self_id,
            round_id,
            deadline_ms,
        };
        let mut buf = BytesMut::new();
        encode_stats_collection_start(&mut buf, &start);
        for &member in ring.members.iter().filter(|&&m| m != ring.self_id) {
            transport.send(member, buf.to_vec()).await?;
        }

        let mut round = ElectionRound::new(round_id, deadline_ms);
        round.record(ring.self_id, our_quality.clone());

        while !round.has_quorum(ring.members.len(), true) {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ErrorKind::Cancelled),
                _ = clock.sleep_until(deadline_ms) => break,
                recv = transport.recv() => {
                    match recv {
                        Ok((sender, bytes)) => {
                            if let Ok(update) = decode_stats_update(&mut bytes.as_slice()) {
                                if update.session_id == ring.session_id
                                    && update.round_id == round_id
                                    && ring.members.contains(&sender)
                                {
                                    if let Some(metric) = update.metrics.into_iter().next() {
                                        round.record(sender, metric);
                                    }
                                }
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        if round.has_quorum(ring.members.len(), true) {
            ring.round = RoundState::Electing;
            let now_ms = clock.now_ms();
            if let Some(decision) = elect(
                &round.received,
                config.freshness_budget_ms,
                now_ms,
                config.host_default_port,
                round_id,
                now_ms,
            ) {
                tracing::info!(round_id, host = ?decision.host_id, "stats round elected a host");
                return Ok(decision);
            }
        }

        attempt += 1;
        if attempt > config.max_round_retries {
            ring.round = RoundState::Failed;
            tracing::warn!(
                round_id,
                received = round.received.len(),
                "stats round exhausted retries without quorum"
            );
            return Err(ErrorKind::InsufficientQuorum {
                received: round.received.len(),
                needed: ElectionRound::quorum_needed(ring.members.len()),
            });
        }
        tracing::debug!(round_id, attempt, "stats round missed quorum, retrying");
        ring.generation += 1;
    }
}

/// Participate in a stats-collection round as a follower: wait for the
/// leader's `STATS_COLLECTION_START`, reply with our own measured quality,
/// and retransmit once after `config.follower_retransmit_delay_ms` as
/// insurance against a dropped update (spec §4.5). Returns the observed
/// `StatsCollectionStart` so the caller can track the round's `round_id`
/// while waiting for the eventual `RING_ELECTION_RESULT`.
pub async fn run_follower_round<T, C>(
    ring: &RingContext,
    our_quality: &NatQuality,
    transport: &T,
    clock: &C,
    cancel: &CancelToken,
    config: &BootstrapConfig,
) -> Result<StatsCollectionStart>
where
    T: Transport,
    C: Clock,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ErrorKind::Cancelled),
            recv = transport.recv() => {
                let (sender, bytes) = recv?;
                if sender != ring.leader_id() {
                    continue;
                }
                let start = match decode_stats_collection_start(&mut bytes.as_slice()) {
                    Ok(s) if s.session_id == ring.session_id => s,
                    _ => continue,
                };
                tracing::debug!(round_id = start.round_id, "reporting stats to leader");
                send_update(&start, ring.self_id, our_quality, transport).await?;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ErrorKind::Cancelled),
                    _ = clock.sleep_until(clock.now_ms() + config.follower_retransmit_delay_ms) => {
                        send_update(&start, ring.self_id, our_quality, transport).await?;
                    }
                }
                return Ok(start);
            }
        }
    }
}

async fn send_update<T: Transport>(
    start: &StatsCollectionStart,
    self_id: ParticipantId,
    quality: &NatQuality,
    transport: &T,
) -> Result<()> {
    let update = StatsUpdate {
        session_id: start.session_id,
        sender_id: self_id,
        round_id: start.round_id,
        metrics: vec![quality.clone()],
    };
    let mut buf = BytesMut::new();
    encode_stats_update(&mut buf, &update);
    transport.send(start.initiator_id, buf.to_vec()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::build_ring;
    use acip_net::clock::MockClock;
    use acip_net::nat::{ConnectionType, Tier};
    use acip_net::InMemoryTransport;

    fn quality() -> NatQuality {
        NatQuality {
            tier: Tier::Public,
            upload_kbps: 5_000,
            rtt_ms: 20,
            stun_probe_success_pct: 100,
            public_address: "203.0.113.1".into(),
            public_port: 9090,
            has_public_ip: true,
            upnp_available: false,
            upnp_mapped_port: 0,
            connection_type: ConnectionType::DirectPublic,
            measurement_time_ms: 0,
            measurement_window_ms: 0,
            detection_complete: true,
        }
    }

    #[tokio::test]
    async fn leader_elects_once_all_followers_report() {
        let ids = [[1u8; 16], [2u8; 16], [3u8; 16]];
        let transports = InMemoryTransport::mesh(&ids);
        let clock = MockClock::new(0);
        let config = BootstrapConfig::default();

        let mut leader_ring = build_ring([0u8; 16], ids[0], &ids);
        let follower_ring_b = build_ring([0u8; 16], ids[1], &ids);
        let follower_ring_c = build_ring([0u8; 16], ids[2], &ids);

        let leader_transport = transports[0].clone();
        let b_transport = transports[1].clone();
        let c_transport = transports[2].clone();

        let leader_task = {
            let clock = clock.clone();
            let config = config.clone();
            let q = quality();
            async move {
                run_leader_round(
                    &mut leader_ring,
                    &q,
                    leader_transport.as_ref(),
                    &clock,
                    &CancelToken::new(),
                    &config,
                )
                .await
            }
        };
        let b_task = {
            let clock = clock.clone();
            let config = config.clone();
            let q = quality();
            async move {
                run_follower_round(
                    &follower_ring_b,
                    &q,
                    b_transport.as_ref(),
                    &clock,
                    &CancelToken::new(),
                    &config,
                )
                .await
            }
        };
        let c_task = {
            let clock = clock.clone();
            let config = config.clone();
            let q = quality();
            async move {
                run_follower_round(
                    &follower_ring_c,
                    &q,
                    c_transport.as_ref(),
                    &clock,
                    &CancelToken::new(),
                    &config,
                )
                .await
            }
        };

        let (leader_result, b_result, c_result) = tokio::join!(leader_task, b_task, c_task);
        let decision = leader_result.unwrap();
        assert_eq!(decision.host_id, ids[0]);
        assert!(b_result.is_ok());
        assert!(c_result.is_ok());
    }
}

//! Elector (C6) — pure function computing host + backup from a full
//! quality map (spec §4.6).

use crate::addressing::resolve_address;
use crate::decision::HostDecision;
use crate::ids::ParticipantId;
use acip_net::nat::NatQuality;
use std::collections::HashMap;

/// Score a single participant's quality. Higher is better.
///
/// All arithmetic is 64-bit signed integer so the result is bit-stable
/// across platforms (spec §4.6: "MUST be bit-stable... no floating point").
fn score(q: &NatQuality) -> i64 {
    let tier_term = 10_000i64 * (4 - q.tier as i64);
    let upload_term = (q.upload_kbps as i64).min(50_000) / 10;
    let stun_term = 50i64 * q.stun_probe_success_pct as i64;
    let rtt_term = (q.rtt_ms as i64).min(1_000);
    let upnp_term = if q.upnp_available { 500 } else { 0 };
    let public_ip_term = if q.has_public_ip { 5_000 } else { 0 };
    tier_term + upload_term + stun_term - rtt_term + upnp_term + public_ip_term
}

/// Elect host and backup from a quality map (spec §4.6).
///
/// `qualities` must contain at least one entry after filtering; callers
/// drive this from a `RingContext`/`ElectionRound` that has already reached
/// quorum. `generation`/`elected_at_ms` are threaded in rather than read from
/// global state.
pub fn elect(
    qualities: &HashMap<ParticipantId, NatQuality>,
    freshness_budget_ms: u64,
    now_ms: u64,
    default_port: u16,
    generation: u32,
    elected_at_ms: u64,
) -> Option<HostDecision> {
    let mut eligible: Vec<(&ParticipantId, &NatQuality)> = qualities
        .iter()
        .filter(|(_, q)| q.detection_complete && q.is_fresh(now_ms, freshness_budget_ms))
        .collect();
    if eligible.is_empty() {
        return None;
    }

    // Host: maximum score, tie-break by lexicographically smallest id.
    eligible.sort_by(|(id_a, q_a), (id_b, q_b)| {
        score(q_b).cmp(&score(q_a)).then_with(|| id_a.cmp(id_b))
    });
    let (host_id, host_quality) = eligible[0];

    // Backup: maximum score among the remainder, constrained to
    // backup.tier <= host.tier + 1; absent that, backup == host.
    let host_tier = host_quality.tier as u8;
    let backup = eligible[1..]
        .iter()
        .filter(|(_, q)| (q.tier as u8) <= host_tier + 1)
        .copied()
        .next();

    let (host_address, host_port, connection_type) = resolve_address(host_quality, default_port);
    let (backup_id, backup_address, backup_port) = match backup {
        Some((id, q)) => {
            let (addr, port, _) = resolve_address(q, default_port);
            (*id, addr, port)
        }
        None => (*host_id, host_address.clone(), host_port),
    };

    Some(HostDecision {
        host_id: *host_id,
        backup_id,
        host_address,
        host_port,
        backup_address,
        backup_port,
        connection_type,
        elected_at_ms,
        generation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use acip_net::nat::{ConnectionType, Tier};

    fn quality(tier: Tier, upload: u32, rtt: u16, success: u8, fresh_at: u64) -> NatQuality {
        NatQuality {
            tier,
            upload_kbps: upload,
            rtt_ms: rtt,
            stun_probe_success_pct: success,
            public_address: "203.0.113.1".into(),
            public_port: 9090,
            has_public_ip: tier == Tier::Public,
            upnp_available: false,
            upnp_mapped_port: 0,
            connection_type: if tier == Tier::Public {
                ConnectionType::DirectPublic
            } else {
                ConnectionType::Stun
            },
            measurement_time_ms: fresh_at,
            measurement_window_ms: 0,
            detection_complete: true,
        }
    }

    #[test]
    fn two_tier_zero_and_one_tier_four_host_is_tier_zero() {
        let mut map = HashMap::new();
        map.insert([1u8; 16], quality(Tier::Public, 8_000, 20, 100, 0));
        map.insert([2u8; 16], quality(Tier::FullCone, 3_000, 30, 100, 0));
        map.insert([3u8; 16], quality(Tier::Symmetric, 500, 50, 0, 0));

        let decision = elect(&map, 30_000, 0, 9090, 1, 1_000).unwrap();
        assert!(decision.host_id == [1u8; 16]);
        assert_eq!(decision.backup_id, [2u8; 16]);
    }

    #[test]
    fn stale_records_are_excluded() {
        let mut map = HashMap::new();
        map.insert([1u8; 16], quality(Tier::Public, 8_000, 20, 100, 0));
        let mut stale = quality(Tier::Public, 9_000, 10, 100, 0);
        stale.measurement_time_ms = 0;
        map.insert([2u8; 16], stale);

        let decision = elect(&map, 30_000, 100_000, 9090, 1, 1_000).unwrap();
        assert_eq!(decision.host_id, [1u8; 16]);
        // Both entries are equally stale at now=100_000 with budget 30_000,
        // so neither is eligible -- expect None.
        assert!(elect(&map, 30_000, 1_000_000, 9090, 1, 1_000).is_none());
    }

    #[test]
    fn incomplete_detection_is_excluded() {
        let mut map = HashMap::new();
        let mut q = quality(Tier::Public, 8_000, 20, 100, 0);
        q.detection_complete = false;
        map.insert([1u8; 16], q);
        assert!(elect(&map, 30_000, 0, 9090, 1, 1_000).is_none());
    }

    #[test]
    fn backup_falls_back_to_host_when_no_candidate_qualifies() {
        let mut map = HashMap::new();
        map.insert([1u8; 16], quality(Tier::Public, 8_000, 20, 100, 0));
        map.insert([2u8; 16], quality(Tier::Symmetric, 100, 200, 0, 0));
        let decision = elect(&map, 30_000, 0, 9090, 1, 1_000).unwrap();
        assert_eq!(decision.host_id, [1u8; 16]);
        assert_eq!(decision.backup_id, [1u8; 16]);
        assert!(!decision.has_backup());
    }

    #[test]
    fn tie_break_picks_lexicographically_smallest_id() {
        let mut map = HashMap::new();
        map.insert([9u8; 16], quality(Tier::Public, 8_000, 20, 100, 0));
        map.insert([1u8; 16], quality(Tier::Public, 8_000, 20, 100, 0));
        let decision = elect(&map, 30_000, 0, 9090, 1, 1_000).unwrap();
        assert_eq!(decision.host_id, [1u8; 16]);
    }
}

//! Quality Comparator (C2) — pure, deterministic ordering between two
//! `NatQuality` records, used by the pairwise negotiator to decide who hosts.

use super::quality::NatQuality;

/// Minimum relative and absolute upload advantage before bandwidth
/// outweighs a tier tie: the higher side must be >= 1.25x the lower AND
/// at least 500 kbps ahead.
const UPLOAD_RATIO_THRESHOLD: f64 = 1.25;
const UPLOAD_MIN_DELTA_KBPS: u32 = 500;

/// Minimum RTT delta (ms) before a lower RTT counts as an advantage.
const RTT_MIN_DELTA_MS: i32 = 20;

/// Minimum STUN success-rate delta (percentage points) before it counts.
const STUN_SUCCESS_MIN_DELTA: i32 = 10;

/// Ordering result: `-1` means `a` hosts, `0` is unreachable here (the
/// initiator tie-break always resolves ties), `1` means `b` hosts.
pub type Ordering = i32;

/// Compare two participants' NAT quality to decide who hosts.
///
/// `a_is_initiator` breaks every remaining tie: per spec §9 Open Questions,
/// `isInitiator` is forced to `self_id < peer_id`, so at most one side ever
/// sees itself as the initiator for a given pair.
pub fn compare(a: &NatQuality, b: &NatQuality, a_is_initiator: bool) -> Ordering {
    // 1. tier: lower wins
    let tier_delta = (a.tier as i32) - (b.tier as i32);
    if tier_delta != 0 {
        return tier_delta.signum();
    }

    // 2. uploadKbps: higher wins, only if >= 1.25x AND >= 500kbps ahead
    let (hi, lo, hi_is_a) = if a.upload_kbps >= b.upload_kbps {
        (a.upload_kbps, b.upload_kbps, true)
    } else {
        (b.upload_kbps, a.upload_kbps, false)
    };
    if hi as f64 >= lo as f64 * UPLOAD_RATIO_THRESHOLD && hi - lo >= UPLOAD_MIN_DELTA_KBPS {
        return if hi_is_a { -1 } else { 1 };
    }

    // 3. rttMs: lower wins, minimum delta 20ms
    let rtt_delta = (a.rtt_ms as i32) - (b.rtt_ms as i32);
    if rtt_delta.abs() >= RTT_MIN_DELTA_MS {
        return rtt_delta.signum();
    }

    // 4. stunProbeSuccessPct: higher wins, minimum delta 10
    let stun_delta = (a.stun_probe_success_pct as i32) - (b.stun_probe_success_pct as i32);
    if stun_delta.abs() >= STUN_SUCCESS_MIN_DELTA {
        return -stun_delta.signum();
    }

    // 5. upnpAvailable: true wins
    if a.upnp_available != b.upnp_available {
        return if a.upnp_available { -1 } else { 1 };
    }

    // 6. tie-breaker
    if a_is_initiator {
        -1
    } else {
        1
    }
}

//! Upload bandwidth estimation, the fourth C1 sub-probe.
//!
//! Mirrors the pacing idea behind the teacher's (stubbed)
//! `tallow-net::transport::bandwidth::BandwidthLimiter`, but estimates
//! rather than limits: it paces datagrams across the measurement window and
//! reports how many bytes the peer acknowledged.

use std::time::Duration;

/// Default measurement window for the bandwidth estimate (spec §4.1: "1s of
/// paced probing").
pub const PROBE_WINDOW: Duration = Duration::from_secs(1);

/// Number of probe datagrams sent across the window.
const PROBE_DATAGRAMS: u32 = 20;

/// Size of each probe datagram, in bytes.
const PROBE_DATAGRAM_BYTES: u32 = 1200;

/// Bandwidth estimation capability. Not every STUN server collaborator
/// supports this; the probe driver treats `None`/errors as "unknown" and
/// sets `uploadKbps = 0` per spec.
#[allow(async_fn_in_trait)]
pub trait BandwidthProbe: Send + Sync {
    /// Pace `PROBE_DATAGRAMS` of `PROBE_DATAGRAM_BYTES` across `window`,
    /// returning the estimated sustained upload rate in kbps, or `None` if
    /// the collaborator doesn't support paced probing.
    async fn estimate_upload_kbps(&self, window: Duration) -> Option<u32>;
}

/// Convert acknowledged bytes sent across a window into a kbps estimate.
pub fn kbps_from_bytes(bytes_sent: u64, window: Duration) -> u32 {
    if window.is_zero() {
        return 0;
    }
    let bits = bytes_sent.saturating_mul(8);
    let secs = window.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    ((bits as f64 / secs) / 1000.0).round() as u32
}

/// The total bytes a full paced run would send, for a collaborator that
/// wants to budget the probe against `PROBE_WINDOW`.
pub fn probe_total_bytes() -> u32 {
    PROBE_DATAGRAMS * PROBE_DATAGRAM_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kbps_conversion_matches_known_rate() {
        // 125,000 bytes/sec == 1,000,000 bits/sec == 1000 kbps
        assert_eq!(kbps_from_bytes(125_000, Duration::from_secs(1)), 1_000);
    }

    #[test]
    fn zero_window_yields_zero_kbps() {
        assert_eq!(kbps_from_bytes(125_000, Duration::ZERO), 0);
    }

    #[test]
    fn probe_total_bytes_matches_datagram_accounting() {
        assert_eq!(probe_total_bytes(), PROBE_DATAGRAMS * PROBE_DATAGRAM_BYTES);
    }
}

//! `NatQuality` — the per-participant reachability record produced by the
//! quality probe (C1) and consumed by the comparator (C2) and elector (C6).

use std::time::{SystemTime, UNIX_EPOCH};

/// Default freshness budget: a measurement older than this is stale.
pub const DEFAULT_FRESHNESS_BUDGET_MS: u64 = 30_000;

/// Coarse NAT classification, lower is better. `0` is a public IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tier {
    /// Public IP, no NAT in the way.
    Public = 0,
    /// Full-cone NAT.
    FullCone = 1,
    /// Restricted-cone NAT.
    RestrictedCone = 2,
    /// Port-restricted cone NAT.
    PortRestricted = 3,
    /// Symmetric NAT — hardest to traverse.
    Symmetric = 4,
}

impl Tier {
    /// Decode from the raw `u8` used on the wire.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Public),
            1 => Some(Self::FullCone),
            2 => Some(Self::RestrictedCone),
            3 => Some(Self::PortRestricted),
            4 => Some(Self::Symmetric),
            _ => None,
        }
    }
}

/// How self reaches (or is reached at) the hosting participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionType {
    /// Direct connection to a publicly routable address.
    DirectPublic = 0,
    /// Connection via a UPnP-mapped port.
    Upnp = 1,
    /// Connection via STUN-assisted hole punching.
    Stun = 2,
}

impl ConnectionType {
    /// Decode from the raw `u8` used on the wire.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::DirectPublic),
            1 => Some(Self::Upnp),
            2 => Some(Self::Stun),
            _ => None,
        }
    }
}

/// Reachability, bandwidth, and NAT-traversal measurements for one
/// participant, as produced by the quality probe (C1).
///
/// See spec §3 for the full invariant list; [`NatQuality::check_invariants`]
/// validates them.
#[derive(Debug, Clone, PartialEq)]
pub struct NatQuality {
    /// Coarse NAT classification.
    pub tier: Tier,
    /// Sustained upload estimate, in kbps.
    pub upload_kbps: u32,
    /// RTT to the STUN reference server, in ms.
    pub rtt_ms: u16,
    /// Percentage (0-100) of STUN binding attempts that succeeded.
    pub stun_probe_success_pct: u8,
    /// Public address as seen by STUN; empty if unknown. At most 63 bytes.
    pub public_address: String,
    /// Public port as seen by STUN.
    pub public_port: u16,
    /// Whether this participant has a publicly routable address.
    pub has_public_ip: bool,
    /// Whether a UPnP IGD responded and a mapping was obtained.
    pub upnp_available: bool,
    /// The externally mapped port, if `upnp_available`.
    pub upnp_mapped_port: u16,
    /// How this participant would be reached if it hosts.
    pub connection_type: ConnectionType,
    /// Wall-clock anchor for this measurement (ms since epoch).
    pub measurement_time_ms: u64,
    /// Wall-clock span the measurement took, in ms.
    pub measurement_window_ms: u32,
    /// Set once every sub-probe has finished (succeeded or timed out).
    pub detection_complete: bool,
}

impl NatQuality {
    /// Current wall-clock time in ms since epoch, for stamping measurements.
    pub fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Whether this record is fresh relative to `now`, given `freshness_budget_ms`.
    pub fn is_fresh(&self, now_ms: u64, freshness_budget_ms: u64) -> bool {
        now_ms.saturating_sub(self.measurement_time_ms) <= freshness_budget_ms
    }

    /// Validate the §3 invariants. Returns the first violation found, if any.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if (self.tier == Tier::Public) != self.has_public_ip {
            return Err("tier == Public iff has_public_ip");
        }
        if self.upnp_available && self.upnp_mapped_port == 0 {
            return Err("upnp_available implies upnp_mapped_port > 0");
        }
        match self.connection_type {
            ConnectionType::DirectPublic if self.tier != Tier::Public => {
                return Err("DIRECT_PUBLIC implies tier == Public");
            }
            ConnectionType::Upnp if !self.upnp_available => {
                return Err("UPNP implies upnp_available");
            }
            _ => {}
        }
        if self.stun_probe_success_pct == 0 && !self.has_public_ip && self.tier != Tier::Symmetric
        {
            return Err("zero STUN success and no public IP implies Symmetric tier");
        }
        Ok(())
    }

    /// The conservative "every sub-probe failed" record: worst tier, zero
    /// bandwidth, no public address. Used by the probe driver when all
    /// sub-probes time out or error, so `detection_complete` can still be
    /// set to `true`.
    pub fn worst_case(now_ms: u64, window_ms: u32) -> Self {
        Self {
            tier: Tier::Symmetric,
            upload_kbps: 0,
            rtt_ms: 0,
            stun_probe_success_pct: 0,
            public_address: String::new(),
            public_port: 0,
            has_public_ip: false,
            upnp_available: false,
            upnp_mapped_port: 0,
            connection_type: ConnectionType::Stun,
            measurement_time_ms: now_ms,
            measurement_window_ms: window_ms,
            detection_complete: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_quality() -> NatQuality {
        NatQuality {
            tier: Tier::Public,
            upload_kbps: 10_000,
            rtt_ms: 20,
            stun_probe_success_pct: 100,
            public_address: "203.0.113.1".into(),
            public_port: 9090,
            has_public_ip: true,
            upnp_available: false,
            upnp_mapped_port: 0,
            connection_type: ConnectionType::DirectPublic,
            measurement_time_ms: 1_000,
            measurement_window_ms: 500,
            detection_complete: true,
        }
    }

    #[test]
    fn worst_case_satisfies_invariants() {
        let q = NatQuality::worst_case(1_000, 10_000);
        assert!(q.check_invariants().is_ok());
        assert!(q.detection_complete);
    }

    #[test]
    fn valid_public_record_satisfies_invariants() {
        assert!(public_quality().check_invariants().is_ok());
    }

    #[test]
    fn tier_public_requires_has_public_ip() {
        let mut q = public_quality();
        q.has_public_ip = false;
        assert!(q.check_invariants().is_err());
    }

    #[test]
    fn upnp_available_requires_mapped_port() {
        let mut q = public_quality();
        q.tier = Tier::PortRestricted;
        q.has_public_ip = false;
        q.connection_type = ConnectionType::Upnp;
        q.upnp_available = true;
        q.upnp_mapped_port = 0;
        assert!(q.check_invariants().is_err());
    }

    #[test]
    fn freshness_budget_respected() {
        let q = public_quality();
        assert!(q.is_fresh(1_000 + DEFAULT_FRESHNESS_BUDGET_MS, DEFAULT_FRESHNESS_BUDGET_MS));
        assert!(!q.is_fresh(1_001 + DEFAULT_FRESHNESS_BUDGET_MS, DEFAULT_FRESHNESS_BUDGET_MS));
    }

    #[test]
    fn tier_round_trips_through_wire_values() {
        for raw in 0u8..=4 {
            assert_eq!(Tier::from_u8(raw).unwrap() as u8, raw);
        }
        assert!(Tier::from_u8(5).is_none());
    }
}

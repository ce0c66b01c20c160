//! Host/backup address resolution shared by the pairwise negotiator (C3)
//! and the elector (C6) — spec §4.3 "Host address selection".

use acip_net::nat::{ConnectionType, NatQuality};

/// Loopback fallback used only when a quality record reports no public
/// address — a test-mode affordance the spec preserves deliberately
/// (spec §9 Open Questions).
pub const LOOPBACK_FALLBACK: &str = "127.0.0.1";

/// Resolve the `(address, port, connectionType)` triple a participant would
/// be reached at, given its own `NatQuality`.
///
/// Port is the UPnP-mapped port when available, otherwise `default_port`.
/// `connectionType` is taken from the quality record itself, which already
/// satisfies the §3 invariants tying it to `tier`/`upnpAvailable`.
pub fn resolve_address(quality: &NatQuality, default_port: u16) -> (String, u16, ConnectionType) {
    let address = if !quality.public_address.is_empty() {
        quality.public_address.clone()
    } else {
        LOOPBACK_FALLBACK.to_string()
    };
    let port = if quality.upnp_available {
        quality.upnp_mapped_port
    } else {
        default_port
    };
    (address, port, quality.connection_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use acip_net::nat::Tier;

    fn quality(public_address: &str, upnp_available: bool, upnp_mapped_port: u16) -> NatQuality {
        NatQuality {
            tier: Tier::Public,
            upload_kbps: 0,
            rtt_ms: 0,
            stun_probe_success_pct: 0,
            public_address: public_address.to_string(),
            public_port: 0,
            has_public_ip: !public_address.is_empty(),
            upnp_available,
            upnp_mapped_port,
            connection_type: if upnp_available {
                ConnectionType::Upnp
            } else {
                ConnectionType::DirectPublic
            },
            measurement_time_ms: 0,
            measurement_window_ms: 0,
            detection_complete: true,
        }
    }

    #[test]
    fn uses_public_address_when_present() {
        let (addr, port, ty) = resolve_address(&quality("203.0.113.1", false, 0), 9090);
        assert_eq!(addr, "203.0.113.1");
        assert_eq!(port, 9090);
        assert_eq!(ty, ConnectionType::DirectPublic);
    }

    #[test]
    fn falls_back_to_loopback_when_address_empty() {
        let (addr, _, _) = resolve_address(&quality("", false, 0), 9090);
        assert_eq!(addr, LOOPBACK_FALLBACK);
    }

    #[test]
    fn uses_mapped_port_when_upnp_available() {
        let (_, port, ty) = resolve_address(&quality("203.0.113.1", true, 41000), 9090);
        assert_eq!(port, 41000);
        assert_eq!(ty, ConnectionType::Upnp);
    }
}

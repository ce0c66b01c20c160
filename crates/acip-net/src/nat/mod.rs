//! NAT quality measurement: the quality probe (C1) and comparator (C2).

pub mod bandwidth;
pub mod comparator;
pub mod probe;
pub mod quality;
pub mod stun;
pub mod upnp;

pub use bandwidth::BandwidthProbe;
pub use comparator::compare;
pub use probe::QualityProbe;
pub use quality::{ConnectionType, NatQuality, Tier, DEFAULT_FRESHNESS_BUDGET_MS};
pub use stun::{Stun, StunResult, UdpStunClient};
pub use upnp::{GatewayInfo, IgdUpnp, Upnp};

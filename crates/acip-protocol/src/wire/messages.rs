//! Wire message structs and their tagged enums (spec §6).
//!
//! String-name enums (`AckStatus`, `NegotiateState`) are modelled as Rust
//! enums in memory but always cross the wire as the fixed `u8` codes below —
//! never as string names (spec §9 Design Notes).

use crate::ids::{ParticipantId, SessionId};
use acip_net::nat::NatQuality;

/// Maximum ring members a `RING_MEMBERS` packet can carry (spec §6: 64·16).
pub const MAX_RING_MEMBERS: usize = 64;

/// 2-byte type tag occupying the first two bytes of every control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PacketType {
    /// `RING_MEMBERS`.
    RingMembers = 6100,
    /// `QUALITY_OFFER`.
    QualityOffer = 6050,
    /// `STATS_COLLECTION_START`.
    StatsCollectionStart = 6101,
    /// `STATS_UPDATE`.
    StatsUpdate = 6102,
    /// `RING_ELECTION_RESULT`.
    RingElectionResult = 6103,
    /// `STATS_ACK`.
    StatsAck = 6104,
}

impl PacketType {
    /// Decode from the raw `u16` type tag.
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            6100 => Some(Self::RingMembers),
            6050 => Some(Self::QualityOffer),
            6101 => Some(Self::StatsCollectionStart),
            6102 => Some(Self::StatsUpdate),
            6103 => Some(Self::RingElectionResult),
            6104 => Some(Self::StatsAck),
            _ => None,
        }
    }
}

/// Acknowledgement status for `STATS_ACK` (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckStatus {
    /// The participant persisted the announced decision without conflict.
    Ok = 0,
    /// The participant already held a different decision for this round.
    Mismatch = 1,
    /// The ack refers to a round the participant has since moved past.
    Stale = 2,
}

impl AckStatus {
    /// Decode from the raw `u8` used on the wire.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::Mismatch),
            2 => Some(Self::Stale),
            _ => None,
        }
    }
}

/// Pairwise negotiator state (spec §4.3), tagged with the wire codes used by
/// out-of-band tracing/debugging; never sent over the wire itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NegotiateState {
    /// Freshly created context, no detection started.
    Init = 0,
    /// C1 running against the shared STUN servers.
    DetectingNat = 1,
    /// Our detection finished; waiting for the peer's offer.
    WaitingPeer = 2,
    /// Both qualities known; running C2.
    Comparing = 3,
    /// C2 decided self hosts.
    WeHost = 4,
    /// C2 decided the peer hosts.
    TheyHost = 5,
    /// Terminal success state.
    Complete = 6,
    /// Terminal failure state.
    Failed = 7,
}

impl NegotiateState {
    /// Decode from the raw `u8` used for tracing/debugging.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Init),
            1 => Some(Self::DetectingNat),
            2 => Some(Self::WaitingPeer),
            3 => Some(Self::Comparing),
            4 => Some(Self::WeHost),
            5 => Some(Self::TheyHost),
            6 => Some(Self::Complete),
            7 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One side's NAT quality offer in the pairwise exchange (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct QualityOffer {
    /// Session this offer belongs to.
    pub session_id: SessionId,
    /// The sender's own participant id.
    pub sender_id: ParticipantId,
    /// The sender's measured quality.
    pub quality: NatQuality,
}

/// Leader's announcement that a stats round has begun (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsCollectionStart {
    /// Session this round belongs to.
    pub session_id: SessionId,
    /// The leader's own id.
    pub initiator_id: ParticipantId,
    /// This round's identifier, equal to the ring's current generation.
    pub round_id: u32,
    /// Absolute ms deadline by which updates must arrive.
    pub deadline_ms: u64,
}

/// A participant's quality report for a given round (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct StatsUpdate {
    /// Session this update belongs to.
    pub session_id: SessionId,
    /// The sender's own id.
    pub sender_id: ParticipantId,
    /// The round this update is for.
    pub round_id: u32,
    /// The reported quality measurements (normally exactly one).
    pub metrics: Vec<NatQuality>,
}

/// Leader's election announcement (spec §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct RingElectionResult {
    /// Session this election belongs to.
    pub session_id: SessionId,
    /// The leader that ran the election.
    pub leader_id: ParticipantId,
    /// The round this election concluded.
    pub round_id: u32,
    /// Elected host.
    pub host_id: ParticipantId,
    /// Host's reachable address.
    pub host_address: String,
    /// Host's reachable port.
    pub host_port: u16,
    /// Elected backup (equal to `host_id` if none qualified).
    pub backup_id: ParticipantId,
    /// Backup's reachable address.
    pub backup_address: String,
    /// Backup's reachable port.
    pub backup_port: u16,
    /// Wall-clock ms this decision was made.
    pub elected_at_ms: u64,
    /// Ring size at election time.
    pub num_participants: u8,
}

/// A follower's acknowledgement of a `RingElectionResult` (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsAck {
    /// Session this ack belongs to.
    pub session_id: SessionId,
    /// The acknowledging participant's own id.
    pub participant_id: ParticipantId,
    /// The round being acknowledged.
    pub round_id: u32,
    /// Whether the decision matched what was already stored.
    pub ack_status: AckStatus,
    /// The host id the acknowledger has on record.
    pub stored_host_id: ParticipantId,
    /// The backup id the acknowledger has on record.
    pub stored_backup_id: ParticipantId,
}

/// The ring membership list distributed to every participant (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct RingMembers {
    /// Session these members belong to.
    pub session_id: SessionId,
    /// Ring members in ascending order (spec §4.4), at most [`MAX_RING_MEMBERS`].
    pub members: Vec<ParticipantId>,
    /// Index of the current leader in `members`.
    pub leader_idx: u8,
    /// The ring's current generation.
    pub generation: u32,
}

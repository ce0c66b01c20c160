//! Byte-packed wire encoding for every control message (spec §6).

pub mod codec;
pub mod messages;

pub use codec::{
    decode_nat_quality, decode_quality_offer, decode_ring_election_result, decode_ring_members,
    decode_stats_ack, decode_stats_collection_start, decode_stats_update, encode_nat_quality,
    encode_quality_offer, encode_ring_election_result, encode_ring_members, encode_stats_ack,
    encode_stats_collection_start, encode_stats_update, NAT_QUALITY_WIRE_LEN,
};
pub use messages::{
    AckStatus, NegotiateState, PacketType, QualityOffer, RingElectionResult, RingMembers,
    StatsAck, StatsCollectionStart, StatsUpdate, MAX_RING_MEMBERS,
};

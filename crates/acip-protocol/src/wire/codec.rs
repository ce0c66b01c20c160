//! Hand-rolled big-endian byte packing for the wire format (spec §6).
//!
//! No serde, no padding: a pair of `encode`/`decode` free functions per
//! message type operating on `bytes::BytesMut`, mirroring the teacher's
//! `tallow-net::nat::candidates::{encode_socket_addr, decode_socket_addr}`
//! and the `TallowCodec` shape in `tallow-protocol::wire::codec`.

use super::messages::{
    AckStatus, PacketType, QualityOffer, RingElectionResult, RingMembers, StatsAck, StatsUpdate,
    StatsCollectionStart, MAX_RING_MEMBERS,
};
use crate::error::{ErrorKind, Result};
use crate::ids::{ParticipantId, SessionId};
use acip_net::nat::{ConnectionType, NatQuality, Tier};
use bytes::{Buf, BufMut, BytesMut};

/// Logical cap on `NatQuality::public_address` (spec §3: `string(≤63)`).
const PUBLIC_ADDRESS_MAX: usize = 63;
/// On-wire width of a length-prefixed address field: 1 length byte + 63 data bytes.
const ADDRESS_FIELD_LEN: usize = 1 + PUBLIC_ADDRESS_MAX;
/// `NatQuality` reserved trailer, zeroed on encode and ignored on decode —
/// keeps the struct's wire size at the spec-mandated 103 bytes with headroom
/// for fields a future revision might add.
const NAT_QUALITY_RESERVED_LEN: usize = 11;
/// Exact wire size of an encoded `NatQuality` (spec §6).
pub const NAT_QUALITY_WIRE_LEN: usize = 103;

fn put_id(buf: &mut BytesMut, id: &[u8; 16]) {
    buf.put_slice(id);
}

fn get_id(buf: &mut impl Buf) -> Result<[u8; 16]> {
    if buf.remaining() < 16 {
        return Err(ErrorKind::InvalidParam("buffer too short for id".into()));
    }
    let mut id = [0u8; 16];
    buf.copy_to_slice(&mut id);
    Ok(id)
}

fn put_address_field(buf: &mut BytesMut, addr: &str) {
    let bytes = addr.as_bytes();
    let len = bytes.len().min(PUBLIC_ADDRESS_MAX);
    buf.put_u8(len as u8);
    buf.put_slice(&bytes[..len]);
    buf.put_bytes(0, PUBLIC_ADDRESS_MAX - len);
}

fn get_address_field(buf: &mut impl Buf) -> Result<String> {
    if buf.remaining() < ADDRESS_FIELD_LEN {
        return Err(ErrorKind::InvalidParam(
            "buffer too short for address field".into(),
        ));
    }
    let len = buf.get_u8() as usize;
    let mut data = [0u8; PUBLIC_ADDRESS_MAX];
    buf.copy_to_slice(&mut data);
    let len = len.min(PUBLIC_ADDRESS_MAX);
    String::from_utf8(data[..len].to_vec())
        .map_err(|_| ErrorKind::InvalidParam("address field is not valid utf-8".into()))
}

/// Encode a `NatQuality` to exactly [`NAT_QUALITY_WIRE_LEN`] bytes.
pub fn encode_nat_quality(buf: &mut BytesMut, q: &NatQuality) {
    buf.put_u8(q.tier as u8);
    buf.put_u8(q.connection_type as u8);
    buf.put_u8(q.has_public_ip as u8);
    buf.put_u8(q.upnp_available as u8);
    buf.put_u8(q.detection_complete as u8);
    buf.put_u32(q.upload_kbps);
    buf.put_u16(q.rtt_ms);
    buf.put_u8(q.stun_probe_success_pct);
    buf.put_u16(q.public_port);
    buf.put_u16(q.upnp_mapped_port);
    buf.put_u64(q.measurement_time_ms);
    buf.put_u32(q.measurement_window_ms);
    put_address_field(buf, &q.public_address);
    buf.put_bytes(0, NAT_QUALITY_RESERVED_LEN);
}

/// Decode a `NatQuality` from exactly [`NAT_QUALITY_WIRE_LEN`] bytes.
pub fn decode_nat_quality(buf: &mut impl Buf) -> Result<NatQuality> {
    if buf.remaining() < NAT_QUALITY_WIRE_LEN {
        return Err(ErrorKind::InvalidParam(
            "buffer too short for NatQuality".into(),
        ));
    }
    let tier = Tier::from_u8(buf.get_u8())
        .ok_or_else(|| ErrorKind::InvalidParam("unknown tier code".into()))?;
    let connection_type = ConnectionType::from_u8(buf.get_u8())
        .ok_or_else(|| ErrorKind::InvalidParam("unknown connection type code".into()))?;
    let has_public_ip = buf.get_u8() != 0;
    let upnp_available = buf.get_u8() != 0;
    let detection_complete = buf.get_u8() != 0;
    let upload_kbps = buf.get_u32();
    let rtt_ms = buf.get_u16();
    let stun_probe_success_pct = buf.get_u8();
    let public_port = buf.get_u16();
    let upnp_mapped_port = buf.get_u16();
    let measurement_time_ms = buf.get_u64();
    let measurement_window_ms = buf.get_u32();
    let public_address = get_address_field(buf)?;
    buf.advance(NAT_QUALITY_RESERVED_LEN);

    Ok(NatQuality {
        tier,
        upload_kbps,
        rtt_ms,
        stun_probe_success_pct,
        public_address,
        public_port,
        has_public_ip,
        upnp_available,
        upnp_mapped_port,
        connection_type,
        measurement_time_ms,
        measurement_window_ms,
        detection_complete,
    })
}

fn put_type(buf: &mut BytesMut, ty: PacketType) {
    buf.put_u16(ty as u16);
}

fn expect_type(buf: &mut impl Buf, expected: PacketType) -> Result<()> {
    if buf.remaining() < 2 {
        return Err(ErrorKind::InvalidParam("buffer too short for type tag".into()));
    }
    let raw = buf.get_u16();
    let ty = PacketType::from_u16(raw)
        .ok_or_else(|| ErrorKind::InvalidParam(format!("unknown packet type {raw}")))?;
    if ty != expected {
        return Err(ErrorKind::InvalidParam(format!(
            "expected packet type {:?}, got {:?}",
            expected, ty
        )));
    }
    Ok(())
}

/// Encode a `QUALITY_OFFER` message.
pub fn encode_quality_offer(buf: &mut BytesMut, msg: &QualityOffer) {
    put_type(buf, PacketType::QualityOffer);
    put_id(buf, &msg.session_id);
    put_id(buf, &msg.sender_id);
    encode_nat_quality(buf, &msg.quality);
}

/// Decode a `QUALITY_OFFER` message.
pub fn decode_quality_offer(buf: &mut impl Buf) -> Result<QualityOffer> {
    expect_type(buf, PacketType::QualityOffer)?;
    let session_id = get_id(buf)?;
    let sender_id = get_id(buf)?;
    let quality = decode_nat_quality(buf)?;
    Ok(QualityOffer {
        session_id,
        sender_id,
        quality,
    })
}

/// Encode a `STATS_COLLECTION_START` message.
pub fn encode_stats_collection_start(buf: &mut BytesMut, msg: &StatsCollectionStart) {
    put_type(buf, PacketType::StatsCollectionStart);
    put_id(buf, &msg.session_id);
    put_id(buf, &msg.initiator_id);
    buf.put_u32(msg.round_id);
    buf.put_u64(msg.deadline_ms);
}

/// Decode a `STATS_COLLECTION_START` message.
pub fn decode_stats_collection_start(buf: &mut impl Buf) -> Result<StatsCollectionStart> {
    expect_type(buf, PacketType::StatsCollectionStart)?;
    let session_id = get_id(buf)?;
    let initiator_id = get_id(buf)?;
    let round_id = buf.get_u32();
    let deadline_ms = buf.get_u64();
    Ok(StatsCollectionStart {
        session_id,
        initiator_id,
        round_id,
        deadline_ms,
    })
}

/// Encode a `STATS_UPDATE` message.
pub fn encode_stats_update(buf: &mut BytesMut, msg: &StatsUpdate) {
    put_type(buf, PacketType::StatsUpdate);
    put_id(buf, &msg.session_id);
    put_id(buf, &msg.sender_id);
    buf.put_u32(msg.round_id);
    buf.put_u8(msg.metrics.len().min(u8::MAX as usize) as u8);
    for metric in &msg.metrics {
        encode_nat_quality(buf, metric);
    }
}

/// Decode a `STATS_UPDATE` message.
pub fn decode_stats_update(buf: &mut impl Buf) -> Result<StatsUpdate> {
    expect_type(buf, PacketType::StatsUpdate)?;
    let session_id = get_id(buf)?;
    let sender_id = get_id(buf)?;
    let round_id = buf.get_u32();
    if buf.remaining() < 1 {
        return Err(ErrorKind::InvalidParam("missing metrics count".into()));
    }
    let count = buf.get_u8() as usize;
    let mut metrics = Vec::with_capacity(count);
    for _ in 0..count {
        metrics.push(decode_nat_quality(buf)?);
    }
    Ok(StatsUpdate {
        session_id,
        sender_id,
        round_id,
        metrics,
    })
}

/// Encode a `RING_ELECTION_RESULT` message.
pub fn encode_ring_election_result(buf: &mut BytesMut, msg: &RingElectionResult) {
    put_type(buf, PacketType::RingElectionResult);
    put_id(buf, &msg.session_id);
    put_id(buf, &msg.leader_id);
    buf.put_u32(msg.round_id);
    put_id(buf, &msg.host_id);
    put_address_field(buf, &msg.host_address);
    buf.put_u16(msg.host_port);
    put_id(buf, &msg.backup_id);
    put_address_field(buf, &msg.backup_address);
    buf.put_u16(msg.backup_port);
    buf.put_u64(msg.elected_at_ms);
    buf.put_u8(msg.num_participants);
}

/// Decode a `RING_ELECTION_RESULT` message.
pub fn decode_ring_election_result(buf: &mut impl Buf) -> Result<RingElectionResult> {
    expect_type(buf, PacketType::RingElectionResult)?;
    let session_id = get_id(buf)?;
    let leader_id = get_id(buf)?;
    let round_id = buf.get_u32();
    let host_id = get_id(buf)?;
    let host_address = get_address_field(buf)?;
    let host_port = buf.get_u16();
    let backup_id = get_id(buf)?;
    let backup_address = get_address_field(buf)?;
    let backup_port = buf.get_u16();
    let elected_at_ms = buf.get_u64();
    if buf.remaining() < 1 {
        return Err(ErrorKind::InvalidParam("missing num_participants".into()));
    }
    let num_participants = buf.get_u8();
    Ok(RingElectionResult {
        session_id,
        leader_id,
        round_id,
        host_id,
        host_address,
        host_port,
        backup_id,
        backup_address,
        backup_port,
        elected_at_ms,
        num_participants,
    })
}

/// Encode a `STATS_ACK` message.
pub fn encode_stats_ack(buf: &mut BytesMut, msg: &StatsAck) {
    put_type(buf, PacketType::StatsAck);
    put_id(buf, &msg.session_id);
    put_id(buf, &msg.participant_id);
    buf.put_u32(msg.round_id);
    buf.put_u8(msg.ack_status as u8);
    put_id(buf, &msg.stored_host_id);
    put_id(buf, &msg.stored_backup_id);
}

/// Decode a `STATS_ACK` message.
pub fn decode_stats_ack(buf: &mut impl Buf) -> Result<StatsAck> {
    expect_type(buf, PacketType::StatsAck)?;
    let session_id = get_id(buf)?;
    let participant_id = get_id(buf)?;
    let round_id = buf.get_u32();
    if buf.remaining() < 1 {
        return Err(ErrorKind::InvalidParam("missing ack status".into()));
    }
    let ack_status = AckStatus::from_u8(buf.get_u8())
        .ok_or_else(|| ErrorKind::InvalidParam("unknown ack status code".into()))?;
    let stored_host_id = get_id(buf)?;
    let stored_backup_id = get_id(buf)?;
    Ok(StatsAck {
        session_id,
        participant_id,
        round_id,
        ack_status,
        stored_host_id,
        stored_backup_id,
    })
}

/// Encode a `RING_MEMBERS` message. Truncates silently past
/// [`MAX_RING_MEMBERS`] — callers are expected to have validated ring size
/// before reaching the wire.
pub fn encode_ring_members(buf: &mut BytesMut, msg: &RingMembers) {
    put_type(buf, PacketType::RingMembers);
    put_id(buf, &msg.session_id);
    let count = msg.members.len().min(MAX_RING_MEMBERS);
    for member in msg.members.iter().take(count) {
        put_id(buf, member);
    }
    for _ in count..MAX_RING_MEMBERS {
        buf.put_bytes(0, 16);
    }
    buf.put_u8(count as u8);
    buf.put_u8(msg.leader_idx);
    buf.put_u32(msg.generation);
}

/// Decode a `RING_MEMBERS` message.
pub fn decode_ring_members(buf: &mut impl Buf) -> Result<RingMembers> {
    expect_type(buf, PacketType::RingMembers)?;
    let session_id = get_id(buf)?;
    let mut slots: Vec<ParticipantId> = Vec::with_capacity(MAX_RING_MEMBERS);
    for _ in 0..MAX_RING_MEMBERS {
        slots.push(get_id(buf)?);
    }
    if buf.remaining() < 6 {
        return Err(ErrorKind::InvalidParam(
            "buffer too short for RING_MEMBERS trailer".into(),
        ));
    }
    let count = buf.get_u8() as usize;
    let leader_idx = buf.get_u8();
    let generation = buf.get_u32();
    if count > MAX_RING_MEMBERS {
        return Err(ErrorKind::InvalidParam("ring member count exceeds max".into()));
    }
    slots.truncate(count);
    Ok(RingMembers {
        session_id,
        members: slots,
        leader_idx,
        generation,
    })
}

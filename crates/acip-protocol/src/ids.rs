//! `SessionId`/`ParticipantId` — opaque 16-byte identifiers, compared
//! lexicographically (spec §3) so every participant computes the same ring
//! order and the same election winner from the same byte values.

/// A session-scoped opaque identifier.
pub type SessionId = [u8; 16];

/// A participant-scoped opaque identifier. Lexicographic ordering on the
/// raw bytes is the ring order and the election tie-break.
pub type ParticipantId = [u8; 16];

/// Parse a `ParticipantId` from a hex string, for tests and tooling.
pub fn participant_id_from_hex(hex: &str) -> Option<ParticipantId> {
    if hex.len() != 32 {
        return None;
    }
    let mut id = [0u8; 16];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).ok()?;
        id[i] = u8::from_str_radix(s, 16).ok()?;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let id = participant_id_from_hex("0102030405060708090a0b0c0d0e0f10").unwrap();
        assert_eq!(id[0], 0x01);
        assert_eq!(id[15], 0x10);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(participant_id_from_hex("0102").is_none());
    }

    #[test]
    fn lexicographic_order_matches_byte_order() {
        let a: ParticipantId = [0x01; 16];
        let b: ParticipantId = [0x02; 16];
        assert!(a < b);
    }
}

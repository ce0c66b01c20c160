//! STUN client for NAT discovery (RFC 5389 binding requests).
//!
//! Builds and parses the minimal subset of the STUN wire format the quality
//! probe needs: a binding request, and a binding success response carrying
//! an `XOR-MAPPED-ADDRESS` attribute.

use crate::error::{ErrorKind, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// STUN magic cookie (RFC 5389 §6).
const MAGIC_COOKIE: u32 = 0x2112_A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;
const XOR_MAPPED_ADDRESS: u16 = 0x0020;

/// Retry backoff schedule for the STUN binding probe (spec §4.1).
pub const RETRY_BACKOFF_MS: [u64; 3] = [500, 1_000, 2_000];

/// Result of a successful STUN binding exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StunResult {
    /// The reflexive (public) address as seen by the STUN server.
    pub mapped_addr: SocketAddr,
    /// Round-trip time of the exchange, in ms.
    pub rtt_ms: u16,
}

/// STUN binding capability consumed by the quality probe. A real
/// implementation sends/receives RFC 5389 binding requests over UDP; a test
/// double can return canned results without touching a socket.
#[allow(async_fn_in_trait)]
pub trait Stun: Send + Sync {
    /// Perform one binding request/response exchange against `server`,
    /// sourced from `local_port`.
    async fn binding_request(&self, server: SocketAddr, local_port: u16) -> Result<StunResult>;
}

/// Encode a STUN binding request with a random transaction ID.
pub fn encode_binding_request(transaction_id: [u8; 12]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(20);
    buf.extend_from_slice(&BINDING_REQUEST.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // message length: no attributes
    buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
    buf.extend_from_slice(&transaction_id);
    buf
}

/// Parse a STUN binding response, recovering the XOR-MAPPED-ADDRESS.
///
/// Returns `Err` if the header doesn't match a binding success response,
/// the transaction ID doesn't match, or no `XOR-MAPPED-ADDRESS` attribute
/// is present.
pub fn parse_binding_response(buf: &[u8], expected_txn: [u8; 12]) -> Result<SocketAddr> {
    if buf.len() < 20 {
        return Err(ErrorKind::ProbeFailed("STUN response too short".into()));
    }
    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    if msg_type != BINDING_SUCCESS {
        return Err(ErrorKind::ProbeFailed(format!(
            "unexpected STUN message type {:#06x}",
            msg_type
        )));
    }
    let msg_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if cookie != MAGIC_COOKIE {
        return Err(ErrorKind::ProbeFailed("bad STUN magic cookie".into()));
    }
    if buf[8..20] != expected_txn {
        return Err(ErrorKind::ProbeFailed("STUN transaction ID mismatch".into()));
    }
    if buf.len() < 20 + msg_len {
        return Err(ErrorKind::ProbeFailed("STUN response truncated".into()));
    }

    let mut offset = 20;
    while offset + 4 <= 20 + msg_len {
        let attr_type = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        let attr_len = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
        let value_start = offset + 4;
        let value_end = value_start + attr_len;
        if value_end > buf.len() {
            break;
        }
        if attr_type == XOR_MAPPED_ADDRESS {
            return decode_xor_mapped_address(&buf[value_start..value_end], expected_txn);
        }
        // attributes are padded to a 4-byte boundary
        let padded_len = (attr_len + 3) & !3;
        offset = value_start + padded_len;
    }
    Err(ErrorKind::ProbeFailed(
        "no XOR-MAPPED-ADDRESS attribute in STUN response".into(),
    ))
}

fn decode_xor_mapped_address(value: &[u8], transaction_id: [u8; 12]) -> Result<SocketAddr> {
    if value.len() < 8 {
        return Err(ErrorKind::ProbeFailed("XOR-MAPPED-ADDRESS too short".into()));
    }
    let family = value[1];
    let xport = u16::from_be_bytes([value[2], value[3]]);
    let port = xport ^ ((MAGIC_COOKIE >> 16) as u16);
    match family {
        0x01 => {
            let xaddr = u32::from_be_bytes([value[4], value[5], value[6], value[7]]);
            let addr = xaddr ^ MAGIC_COOKIE;
            let ip = Ipv4Addr::from(addr.to_be_bytes());
            Ok(SocketAddr::new(IpAddr::V4(ip), port))
        }
        0x02 => {
            if value.len() < 20 {
                return Err(ErrorKind::ProbeFailed("XOR-MAPPED-ADDRESS (v6) too short".into()));
            }
            let mut xor_key = [0u8; 16];
            xor_key[0..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            xor_key[4..16].copy_from_slice(&transaction_id);
            let mut octets = [0u8; 16];
            for i in 0..16 {
                octets[i] = value[4 + i] ^ xor_key[i];
            }
            Ok(SocketAddr::new(IpAddr::V6(octets.into()), port))
        }
        _ => Err(ErrorKind::ProbeFailed("unknown STUN address family".into())),
    }
}

/// A real STUN client performing binding requests over a UDP socket bound to
/// the caller's chosen local port, with the spec's 3-attempt backoff.
#[derive(Debug)]
pub struct UdpStunClient;

impl Stun for UdpStunClient {
    async fn binding_request(&self, server: SocketAddr, local_port: u16) -> Result<StunResult> {
        let socket = tokio::net::UdpSocket::bind(("0.0.0.0", local_port))
            .await
            .map_err(ErrorKind::from)?;
        socket.connect(server).await.map_err(ErrorKind::from)?;

        let mut txn = [0u8; 12];
        crate::rng::OsRng.fill(&mut txn);
        let request = encode_binding_request(txn);

        let mut last_err = ErrorKind::ProbeFailed("no STUN attempts made".into());
        for (attempt, &backoff_ms) in super::stun::RETRY_BACKOFF_MS.iter().enumerate() {
            let started = std::time::Instant::now();
            socket.send(&request).await.map_err(ErrorKind::from)?;

            let mut buf = [0u8; 512];
            let recv_result = tokio::time::timeout(Duration::from_millis(backoff_ms), socket.recv(&mut buf)).await;
            match recv_result {
                Ok(Ok(n)) => {
                    let rtt_ms = started.elapsed().as_millis().min(u16::MAX as u128) as u16;
                    tracing::debug!(attempt = attempt + 1, rtt_ms, %server, "STUN binding succeeded");
                    return parse_binding_response(&buf[..n], txn)
                        .map(|mapped_addr| StunResult { mapped_addr, rtt_ms });
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt = attempt + 1, %server, "STUN send/recv error: {e}");
                    last_err = ErrorKind::from(e)
                }
                Err(_) => {
                    tracing::debug!(attempt = attempt + 1, backoff_ms, %server, "STUN attempt timed out");
                    last_err = ErrorKind::ProbeFailed(format!(
                        "STUN attempt {} timed out after {}ms",
                        attempt + 1,
                        backoff_ms
                    ))
                }
            }
        }
        tracing::warn!(%server, "STUN binding request exhausted all retries");
        Err(last_err)
    }
}

//! Pairwise Negotiator (C3) driver — races our own quality probe against
//! the peer's `QUALITY_OFFER`, feeding both into the pure state machine in
//! [`super::context`] (spec §4.3).

use super::context::NegotiationContext;
use crate::config::BootstrapConfig;
use crate::decision::HostDecision;
use crate::wire::messages::{NegotiateState, QualityOffer};
use crate::wire::{decode_quality_offer, encode_quality_offer};
use acip_net::clock::Clock;
use acip_net::nat::{BandwidthProbe, NatQuality, QualityProbe, Stun, Upnp};
use acip_net::{CancelToken, ErrorKind, Result, Transport};
use bytes::BytesMut;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

/// Drive the pairwise negotiator end to end: run C1, exchange
/// `QUALITY_OFFER`s, and resolve the host decision via C2 — bounded by the
/// pairwise exchange deadline and `cancel`.
#[allow(clippy::too_many_arguments)]
pub async fn run_pairwise<'a, S, U, B, C, T>(
    ctx: &mut NegotiationContext,
    probe: &QualityProbe<'a, S, U, B, C>,
    primary_stun: SocketAddr,
    secondary_stun: SocketAddr,
    local_port: u16,
    transport: &T,
    clock: &C,
    cancel: &CancelToken,
    config: &BootstrapConfig,
) -> Result<HostDecision>
where
    S: Stun,
    U: Upnp,
    B: BandwidthProbe,
    C: Clock,
    T: Transport,
{
    ctx.start_detection();
    let deadline_ms = clock.now_ms() + config.pairwise_deadline_ms;

    let mut probe_fut: Pin<Box<dyn Future<Output = Result<NatQuality>> + Send + 'a>> =
        Box::pin(probe.probe(primary_stun, secondary_stun, local_port, cancel));

    while !ctx.is_terminal() {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("pairwise negotiation cancelled");
                ctx.fail(ErrorKind::Cancelled);
            }
            _ = clock.sleep_until(deadline_ms) => {
                tracing::warn!("pairwise negotiation deadline exceeded");
                ctx.fail(ErrorKind::Timeout);
            }
            result = &mut probe_fut => {
                probe_fut = Box::pin(std::future::pending());
                match result {
                    Ok(quality) => {
                        let offer = QualityOffer {
                            session_id: ctx.session_id,
                            sender_id: ctx.self_id,
                            quality: quality.clone(),
                        };
                        let mut buf = BytesMut::new();
                        encode_quality_offer(&mut buf, &offer);
                        if let Err(e) = transport.send(ctx.peer_id, buf.to_vec()).await {
                            ctx.fail(e);
                        } else {
                            tracing::debug!("sent our quality offer, awaiting peer");
                            ctx.on_our_quality_ready(quality, config.host_default_port, clock.now_ms());
                        }
                    }
                    Err(e) => ctx.fail(e),
                }
            }
            recv = transport.recv() => {
                match recv {
                    Ok((sender, bytes)) if sender == ctx.peer_id => {
                        if let Ok(offer) = decode_quality_offer(&mut bytes.as_slice()) {
                            if offer.session_id == ctx.session_id {
                                ctx.on_peer_quality_received(
                                    offer.quality,
                                    config.host_default_port,
                                    clock.now_ms(),
                                );
                            }
                        }
                    }
                    Ok(_) => {} // message from an unexpected sender; ignore
                    Err(e) => ctx.fail(e),
                }
            }
        }
    }

    match ctx.state {
        NegotiateState::Complete => {
            let decision = ctx
                .result
                .clone()
                .expect("Complete state always carries a result");
            tracing::info!(host = ?decision.host_id, "pairwise negotiation resolved");
            Ok(decision)
        }
        _ => Err(ctx
            .error
            .clone()
            .unwrap_or_else(|| ErrorKind::InvalidState("negotiation failed without a cause".into()))),
    }
}

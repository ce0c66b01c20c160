//! Quality Probe (C1) — runs the STUN, NAT-behaviour, UPnP, and bandwidth
//! sub-probes concurrently under one deadline and assembles a `NatQuality`.

use super::bandwidth::{BandwidthProbe, PROBE_WINDOW};
use super::quality::{ConnectionType, NatQuality, Tier};
use super::stun::Stun;
use super::upnp::Upnp;
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::error::{ErrorKind, Result};
use std::net::SocketAddr;

/// Default overall probe deadline (spec §5).
pub const DEFAULT_PROBE_DEADLINE_MS: u64 = 10_000;

/// Drives the four C1 sub-probes against a pair of STUN reference servers.
pub struct QualityProbe<'a, S, U, B, C> {
    stun: &'a S,
    upnp: &'a U,
    bandwidth: Option<&'a B>,
    clock: &'a C,
}

impl<'a, S, U, B, C> QualityProbe<'a, S, U, B, C>
where
    S: Stun,
    U: Upnp,
    B: BandwidthProbe,
    C: Clock,
{
    /// Build a probe driver. `bandwidth` is optional because not every
    /// deployment has a STUN server that supports paced probing.
    pub fn new(stun: &'a S, upnp: &'a U, bandwidth: Option<&'a B>, clock: &'a C) -> Self {
        Self {
            stun,
            upnp,
            bandwidth,
            clock,
        }
    }

    /// Run all sub-probes concurrently, bounded by
    /// [`DEFAULT_PROBE_DEADLINE_MS`] and `cancel`.
    ///
    /// Per spec §4.1, `detection_complete` is always `true` on return
    /// (success or not) — individual sub-probe failures degrade to
    /// conservative defaults rather than failing the whole probe. The
    /// overall call only errors on [`ErrorKind::Cancelled`], or
    /// [`ErrorKind::ProbeFailed`] if literally every sub-probe failed.
    pub async fn probe(
        &self,
        primary_server: SocketAddr,
        secondary_server: SocketAddr,
        local_port: u16,
        cancel: &CancelToken,
    ) -> Result<NatQuality> {
        if cancel.is_cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        tracing::debug!("starting NAT quality probe");

        let started_ms = self.clock.now_ms();
        let deadline_ms = started_ms + DEFAULT_PROBE_DEADLINE_MS;

        let sub_probes = async {
            tokio::join!(
                self.run_stun_behaviour(primary_server, secondary_server, local_port),
                self.run_upnp(local_port),
                self.run_bandwidth(),
            )
        };

        let (stun_outcome, upnp_outcome, bandwidth_kbps) = tokio::select! {
            _ = cancel.cancelled() => return Err(ErrorKind::Cancelled),
            _ = self.clock.sleep_until(deadline_ms) => {
                // Deadline hit before every sub-probe finished: treat
                // whatever didn't complete as a conservative failure.
                (StunOutcome::failed(), None, None)
            }
            result = sub_probes => result,
        };

        let now_ms = self.clock.now_ms();
        let window_ms = (now_ms.saturating_sub(started_ms)) as u32;

        if stun_outcome.attempts == 0 && upnp_outcome.is_none() {
            tracing::warn!("NAT quality probe: every sub-probe failed or timed out");
            return Err(ErrorKind::ProbeFailed(
                "every sub-probe failed or timed out".into(),
            ));
        }

        let (upnp_available, upnp_mapped_port) = match upnp_outcome {
            Some(port) => (true, port),
            None => (false, 0),
        };

        let has_public_ip = stun_outcome.tier == Tier::Public;
        let connection_type = if has_public_ip {
            ConnectionType::DirectPublic
        } else if upnp_available {
            ConnectionType::Upnp
        } else {
            ConnectionType::Stun
        };

        let quality = NatQuality {
            tier: stun_outcome.tier,
            upload_kbps: bandwidth_kbps.unwrap_or(0),
            rtt_ms: stun_outcome.rtt_ms,
            stun_probe_success_pct: stun_outcome.success_pct(),
            public_address: stun_outcome
                .reflexive
                .map(|a| a.ip().to_string())
                .unwrap_or_default(),
            public_port: stun_outcome.reflexive.map(|a| a.port()).unwrap_or(0),
            has_public_ip,
            upnp_available,
            upnp_mapped_port,
            connection_type,
            measurement_time_ms: now_ms,
            measurement_window_ms: window_ms,
            detection_complete: true,
        };
        debug_assert!(quality.check_invariants().is_ok());
        tracing::info!(
            tier = ?quality.tier,
            upload_kbps = quality.upload_kbps,
            upnp_available = quality.upnp_available,
            "NAT quality probe finished"
        );
        Ok(quality)
    }

    async fn run_stun_behaviour(
        &self,
        primary: SocketAddr,
        secondary: SocketAddr,
        local_port: u16,
    ) -> StunOutcome {
        let primary_result = self.stun.binding_request(primary, local_port).await;
        let secondary_result = self.stun.binding_request(secondary, local_port).await;

        let mut attempts = 0u8;
        let mut successes = 0u8;
        let mut rtt_ms = 0u16;
        let mut primary_addr = None;
        let mut secondary_addr = None;

        attempts += 1;
        if let Ok(r) = &primary_result {
            successes += 1;
            rtt_ms = r.rtt_ms;
            primary_addr = Some(r.mapped_addr);
        }
        attempts += 1;
        if let Ok(r) = &secondary_result {
            successes += 1;
            secondary_addr = Some(r.mapped_addr);
        }

        let tier = match (primary_addr, secondary_addr) {
            (Some(p), Some(s)) if p.port() == local_port => {
                let _ = s;
                Tier::Public
            }
            (Some(p), Some(s)) if p.port() == s.port() => Tier::FullCone,
            (Some(_), Some(_)) => Tier::Symmetric,
            (Some(p), None) if p.port() == local_port => Tier::Public,
            (Some(_), None) => Tier::FullCone,
            (None, _) => Tier::Symmetric,
        };

        StunOutcome {
            attempts,
            successes,
            reflexive: primary_addr.or(secondary_addr),
            rtt_ms,
            tier,
        }
    }

    async fn run_upnp(&self, local_port: u16) -> Option<u16> {
        let _gateway = self.upnp.probe().await?;
        self.upnp.map_port(local_port, local_port, 0).await.ok()
    }

    async fn run_bandwidth(&self) -> Option<u32> {
        match self.bandwidth {
            Some(b) => b.estimate_upload_kbps(PROBE_WINDOW).await,
            None => None,
        }
    }
}

struct StunOutcome {
    attempts: u8,
    successes: u8,
    reflexive: Option<SocketAddr>,
    rtt_ms: u16,
    tier: Tier,
}

impl StunOutcome {
    fn failed() -> Self {
        Self {
            attempts: 0,
            successes: 0,
            reflexive: None,
            rtt_ms: 0,
            tier: Tier::Symmetric,
        }
    }

    fn success_pct(&self) -> u8 {
        if self.attempts == 0 {
            0
        } else {
            ((self.successes as u32 * 100) / self.attempts as u32) as u8
        }
    }
}

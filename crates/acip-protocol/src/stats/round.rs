//! Round state machine and the leader's in-flight `ElectionRound` (spec §3, §4.5).

use crate::ids::ParticipantId;
use acip_net::nat::NatQuality;
use std::collections::HashMap;

/// Round state machine driving C5/C7 (spec §4.5):
/// `IDLE -> COLLECTING -> (ELECTING | FAILED) -> ANNOUNCING -> (DONE | FAILED)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// No round in flight.
    Idle,
    /// Leader is gathering `STATS_UPDATE`s.
    Collecting,
    /// Quorum reached; running the elector.
    Electing,
    /// Leader is disseminating `RING_ELECTION_RESULT` and awaiting acks.
    Announcing,
    /// Election disseminated and acknowledged by a majority.
    Done,
    /// Round failed terminally (quorum or dissemination exhausted).
    Failed,
}

/// State the leader holds while a stats-collection round is in flight
/// (spec §3 `ElectionRound`).
#[derive(Debug, Clone)]
pub struct ElectionRound {
    /// Equal to the ring's `generation` at round start.
    pub round_id: u32,
    /// Absolute ms deadline for this round.
    pub deadline_ms: u64,
    /// Per-sender latest `NatQuality`, keyed by participant id.
    pub received: HashMap<ParticipantId, NatQuality>,
}

impl ElectionRound {
    /// Start a fresh round with no updates yet received.
    pub fn new(round_id: u32, deadline_ms: u64) -> Self {
        Self {
            round_id,
            deadline_ms,
            received: HashMap::new(),
        }
    }

    /// Record an update, keeping only the latest per sender (spec §4.5:
    /// "per-sender only the latest update is retained").
    pub fn record(&mut self, sender: ParticipantId, quality: NatQuality) {
        self.received.insert(sender, quality);
    }

    /// Strict majority required for quorum, including the leader itself:
    /// `⌈N/2⌉ + 1`.
    pub fn quorum_needed(member_count: usize) -> usize {
        member_count.div_ceil(2) + 1
    }

    /// Whether quorum has been reached, counting the leader's own
    /// self-measurement alongside whatever has been `record`ed.
    pub fn has_quorum(&self, member_count: usize, leader_counted: bool) -> bool {
        let received = self.received.len() + usize::from(leader_counted);
        received >= Self::quorum_needed(member_count)
    }
}

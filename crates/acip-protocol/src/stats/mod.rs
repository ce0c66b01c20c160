//! Stats Collector (C5) — round bookkeeping and the leader/follower drivers.

pub mod collector;
pub mod round;

pub use collector::{run_follower_round, run_leader_round};
pub use round::{ElectionRound, RoundState};

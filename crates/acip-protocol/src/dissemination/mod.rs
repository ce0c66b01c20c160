//! Result Disseminator (C7) — leader announcement + follower ack.

pub mod disseminator;

pub use disseminator::{run_follower_dissemination, run_leader_dissemination};

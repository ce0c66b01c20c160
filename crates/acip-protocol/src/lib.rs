//! Pairwise negotiation and consensus election for acip session bootstrap.
//!
//! Built entirely on the collaborator traits `acip-net` defines — this crate
//! owns no socket, no clock, and no RNG of its own.

pub mod addressing;
pub mod config;
pub mod controller;
pub mod decision;
pub mod dissemination;
pub mod elector;
pub mod error;
pub mod ids;
pub mod negotiation;
pub mod ring;
pub mod stats;
pub mod wire;

pub use config::BootstrapConfig;
pub use controller::{Bootstrap, Collaborators, Handle, Status};
pub use decision::HostDecision;
pub use ids::{ParticipantId, SessionId};

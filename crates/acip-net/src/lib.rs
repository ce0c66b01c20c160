//! Networking primitives for session bootstrap: NAT quality measurement
//! (STUN, UPnP, bandwidth probing), the collaborator traits the rest of the
//! bootstrap pipeline is driven through (`Clock`, `Rng`, `Transport`), and
//! cancellation.
//!
//! This crate has no opinion on session semantics — that lives in
//! `acip-protocol`, which is driven entirely through the traits defined
//! here.

pub mod cancel;
pub mod clock;
pub mod error;
pub mod nat;
pub mod rng;
pub mod transport;

pub use cancel::CancelToken;
pub use clock::{Clock, MockClock, Millis, SystemClock};
pub use error::{ErrorKind, Result};
pub use rng::{OsRng, Rng};
pub use transport::{InMemoryTransport, PeerId, Transport};

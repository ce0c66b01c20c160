//! Re-exports the shared error taxonomy; the bootstrap protocol has no
//! error variants of its own beyond what `acip-net` already defines.

pub use acip_net::error::{ErrorKind, Result};

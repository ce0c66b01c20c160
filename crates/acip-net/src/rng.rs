//! `Rng` collaborator — cryptographically secure randomness, consumed by
//! identifier generation and any jitter added to retry scheduling.

use rand::RngCore;

/// Cryptographically secure randomness capability.
pub trait Rng: Send + Sync {
    /// Fill `buf` with random bytes.
    fn fill(&self, buf: &mut [u8]);
}

/// `Rng` backed by the OS CSPRNG via the `rand` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRng;

impl Rng for OsRng {
    fn fill(&self, buf: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buf);
    }
}

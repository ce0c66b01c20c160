//! Unified error taxonomy for the session bootstrap core.

use thiserror::Error;

/// Result type alias using [`ErrorKind`].
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Errors surfaced anywhere in the bootstrap core.
///
/// Sub-probe failures inside the quality probe are absorbed and never reach
/// this taxonomy (they become conservative defaults on `NatQuality` instead);
/// every other fatal condition a context can reach is listed here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input at an entry point.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Caller invoked an operation not permitted by the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The quality probe could not produce any usable sub-measurement.
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// A peer sent contradictory data in the same round.
    #[error("protocol conflict: {0}")]
    ProtocolConflict(String),

    /// Fewer than the required majority responded within the round deadline.
    #[error("insufficient quorum: received {received}, needed {needed}")]
    InsufficientQuorum {
        /// Updates actually received.
        received: usize,
        /// Updates required for quorum.
        needed: usize,
    },

    /// Majority did not acknowledge the election within the dissemination budget.
    #[error("dissemination failed: {acked}/{needed} acknowledged")]
    DisseminationFailed {
        /// Participants that acknowledged with `OK`.
        acked: usize,
        /// Acknowledgements required.
        needed: usize,
    },

    /// Caller-initiated abort.
    #[error("cancelled")]
    Cancelled,

    /// The total bootstrap deadline was reached.
    #[error("timed out")]
    Timeout,

    /// Lower-level I/O failure (socket, gateway discovery, etc).
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

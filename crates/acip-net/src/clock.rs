//! `Clock` collaborator — the core never reads the wall clock directly so
//! that deadlines stay expressible as absolute instants across suspension
//! points (spec §5) and so tests can drive time deterministically.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Wall-clock capability consumed by every component that schedules a
/// deadline (probe, negotiation exchange, stats round, dissemination retry).
pub trait Clock: Send + Sync {
    /// Current time, in ms since epoch.
    fn now_ms(&self) -> Millis;

    /// Suspend the calling task until `deadline_ms` (absolute), or return
    /// immediately if it has already passed.
    fn sleep_until<'a>(&'a self, deadline_ms: Millis) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Real-time clock backed by the system clock and `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        crate::nat::quality::NatQuality::now_ms()
    }

    fn sleep_until<'a>(&'a self, deadline_ms: Millis) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let now = self.now_ms();
            if deadline_ms > now {
                tokio::time::sleep(std::time::Duration::from_millis(deadline_ms - now)).await;
            }
        })
    }
}

/// Deterministic clock for tests: time only advances when [`MockClock::advance`]
/// is called, so round/retry timing tests run instantly and flake-free.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a mock clock starting at `start_ms`.
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advance the mock clock by `delta_ms`.
    pub fn advance(&self, delta_ms: Millis) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Jump the mock clock directly to `ms`.
    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_until<'a>(&'a self, deadline_ms: Millis) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            // Tests drive MockClock forward explicitly; a sleep_until that
            // has already elapsed returns immediately, matching SystemClock.
            while self.now_ms() < deadline_ms {
                tokio::task::yield_now().await;
            }
        })
    }
}

use rand::Rng;
use std::time::Duration;

/// Exponential backoff between failed polls
///
/// Starts at `floor`, doubles on every consecutive failure and saturates at
/// `cap`. A successful poll resets it to `floor`.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    cap: Duration,
    current: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(floor: Duration, cap: Duration) -> Self {
        let cap = cap.max(floor);
        Self {
            floor,
            cap,
            current: floor,
            failures: 0,
        }
    }

    /// Returns the delay for this failure and doubles the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.cap);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Drops back to the floor after a successful poll
    pub fn reset(&mut self) {
        self.current = self.floor;
        self.failures = 0;
    }

    /// The delay the next failure will get
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive failures since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Delay before the next poll after one that found nothing
///
/// `base` plus a uniformly random extra of at most `jitter`.
pub fn idle_delay<R: Rng + ?Sized>(base: Duration, jitter: Duration, rng: &mut R) -> Duration {
    let jitter_ms = jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return base;
    }
    base + Duration::from_millis(rng.gen_range(0..=jitter_ms))
}

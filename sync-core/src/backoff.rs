//! Handshake retry policy.
//!
//! The handshake pings the other side until it answers, waiting
//! exponentially longer between attempts, and gives up after a fixed number
//! of attempts. Giving up is final for the transport generation.

use std::time::Duration;

/// Default number of pings before the handshake gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// Default wait after the first ping.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(10);

/// Default cap on the wait between pings.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1000);

/// Ping retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakePolicy {
    /// Number of pings sent before giving up.
    pub max_attempts: u32,
    /// Wait after the first ping.
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the wait.
    pub max_delay: Duration,
    /// Upper bound on the random extra wait (zero disables jitter).
    pub jitter: Duration,
}

impl HandshakePolicy {
    /// Wait after ping number `attempt` (1-based).
    ///
    /// Formula: min(max_delay, base_delay * 2^(attempt - 1)) + random(0..=jitter)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        base + random_jitter(self.jitter)
    }

    /// Check whether another ping may be sent after `attempts` pings.
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Sum of the waits over all attempts, ignoring jitter.
    pub fn total_budget(&self) -> Duration {
        let no_jitter = Self {
            jitter: Duration::ZERO,
            ..*self
        };
        (1..=self.max_attempts).map(|n| no_jitter.delay_for(n)).sum()
    }
}

impl Default for HandshakePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: Duration::ZERO,
        }
    }
}

/// Generate random jitter between zero and `max` inclusive.
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (max_ms + 1))
}

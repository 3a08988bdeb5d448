use std::time::Duration;

/// Doubling reconnect delay, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial, attempt: 0 }
    }

    /// Attempt number (1-based) and the delay to wait before it.
    pub fn next_delay(&mut self) -> (u32, Duration) {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.current.min(self.max);
        self.current = self.current.saturating_mul(2).min(self.max);
        (self.attempt, delay)
    }

    pub fn attempt(&self) -> u32 { self.attempt }

    /// Call after the stream delivered a successful relist.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempt = 0;
    }
}

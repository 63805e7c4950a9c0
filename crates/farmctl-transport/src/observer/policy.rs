//! Reconnection policy for observers of the live event channel.

use std::time::Duration;

/// Retry ceiling after which the observer gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Connection state as seen by the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

/// `Connected <-> Disconnected -> Reconnecting -> Connected`, with capped
/// exponential backoff between attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    state: ConnectionState,
    attempts: u32,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(MAX_RECONNECT_ATTEMPTS)
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            max_attempts,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Backoff before the 1-indexed `attempt`: `min(1s * 2^(attempt-1), 30s)`.
    #[must_use]
    pub fn delay_for(attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        BASE_DELAY.saturating_mul(1_u32 << exponent).min(MAX_DELAY)
    }

    /// The channel opened.
    pub const fn on_open(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Connected;
    }

    /// The channel failed or closed.
    ///
    /// Returns the delay before the next attempt, or `None` once the
    /// ceiling is reached, leaving the policy `Disconnected`.
    pub fn on_close(&mut self) -> Option<Duration> {
        self.state = ConnectionState::Disconnected;
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        self.state = ConnectionState::Reconnecting;
        Some(Self::delay_for(self.attempts))
    }
}

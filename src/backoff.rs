//! Reconnect backoff with stability hysteresis.
//!
//! When the transport loses its connection it retries on its own; this
//! controller decides how long each retry should wait. The delay doubles on
//! every retry event up to a ceiling, so a flapping device backs off further
//! instead of hammering a recovering broker. Crucially, the delay is reset
//! to the base value only after a connection has stayed open continuously
//! past the stability threshold — a reconnect that immediately drops again
//! does not earn a reset.
//!
//! ```text
//! delay after N retry events = min(max_delay, base_delay * 2^N)
//! ```
//!
//! With the defaults (base 1 s, max 128 s) a sustained outage settles at a
//! retry every 128 seconds.

use std::time::Duration;

use crate::error::DeviceError;

/// Tracks the current retry delay and the stability threshold.
///
/// Mutated only by the lifecycle state machine: `escalate()` on every
/// transport retry event, `reset()` when the stability timer fires.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    /// Delay used after a reset, and the floor of `current`.
    base: Duration,

    /// Delay the transport should use for its next retry.
    current: Duration,

    /// Ceiling for `current`.
    max: Duration,

    /// How long a connection must stay open continuously before the delay
    /// resets to `base`.
    minimum_stable: Duration,
}

impl ReconnectBackoff {
    /// Creates a controller, validating the timing relationships.
    ///
    /// # Errors
    /// Returns `DeviceError::InvalidReconnectTiming` if `base` is zero, if
    /// `max < base`, or if `minimum_stable < base`. These are fatal
    /// configuration errors raised before any connection attempt.
    pub fn new(
        base: Duration,
        max: Duration,
        minimum_stable: Duration,
    ) -> Result<Self, DeviceError> {
        if base.is_zero() {
            return Err(DeviceError::InvalidReconnectTiming(
                "base reconnect delay must be greater than zero".into(),
            ));
        }
        if max < base {
            return Err(DeviceError::InvalidReconnectTiming(format!(
                "maximum reconnect delay ({max:?}) must not be less than the base delay ({base:?})"
            )));
        }
        if minimum_stable < base {
            return Err(DeviceError::InvalidReconnectTiming(format!(
                "minimum stable duration ({minimum_stable:?}) must not be less than the base delay ({base:?})"
            )));
        }
        Ok(Self {
            base,
            current: base,
            max,
            minimum_stable,
        })
    }

    /// Doubles the current delay, capped at the maximum, and returns the new
    /// value. Called once per transport retry event; the returned delay is
    /// the wait the transport should use for its next attempt.
    pub fn escalate(&mut self) -> Duration {
        self.current = self.current.saturating_mul(2).min(self.max);
        self.current
    }

    /// Resets the current delay to the base value. Called only once a
    /// connection has been held open past the stability threshold.
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Delay the transport will be told to wait before its next retry.
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Configured base delay.
    pub fn base_delay(&self) -> Duration {
        self.base
    }

    /// Configured delay ceiling.
    pub fn max_delay(&self) -> Duration {
        self.max
    }

    /// Continuous uptime required before the delay resets.
    pub fn minimum_stable(&self) -> Duration {
        self.minimum_stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_validation_rejects_zero_base() {
        let err = ReconnectBackoff::new(ms(0), ms(1000), ms(1000)).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidReconnectTiming(_)));
    }

    #[test]
    fn test_validation_rejects_max_below_base() {
        let err = ReconnectBackoff::new(ms(1000), ms(500), ms(1000)).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidReconnectTiming(_)));
    }

    #[test]
    fn test_validation_rejects_stability_below_base() {
        let err = ReconnectBackoff::new(ms(1000), ms(8000), ms(500)).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidReconnectTiming(_)));
    }

    #[test]
    fn test_escalation_doubles_and_caps() {
        // base=1000, max=8000: successive retry events give 2000, 4000,
        // 8000, then stay capped at 8000.
        let mut backoff = ReconnectBackoff::new(ms(1000), ms(8000), ms(5000)).unwrap();
        assert_eq!(backoff.escalate(), ms(2000));
        assert_eq!(backoff.escalate(), ms(4000));
        assert_eq!(backoff.escalate(), ms(8000));
        assert_eq!(backoff.escalate(), ms(8000));
        assert_eq!(backoff.current_delay(), ms(8000));
    }

    #[test]
    fn test_current_delay_after_n_events_is_base_times_two_pow_n() {
        let mut backoff = ReconnectBackoff::new(ms(1000), ms(128_000), ms(20_000)).unwrap();
        for n in 1..=7u32 {
            backoff.escalate();
            assert_eq!(backoff.current_delay(), ms(1000 * 2u64.pow(n)));
        }
        // Invariant: current delay never leaves [base, max].
        assert!(backoff.current_delay() >= backoff.base_delay());
        assert!(backoff.current_delay() <= backoff.max_delay());
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = ReconnectBackoff::new(ms(1000), ms(128_000), ms(20_000)).unwrap();
        backoff.escalate();
        backoff.escalate();
        backoff.reset();
        assert_eq!(backoff.current_delay(), ms(1000));
    }
}

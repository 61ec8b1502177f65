//! Named countdown timer used by the FSM for connect-retry, delay-open,
//! hold-time and keep-alive (RFC 4271 Section 4.4, Section 8).
//!
//! A `Timer` carries no I/O of its own -- the FSM only tracks whether it is
//! running and when it is due, and the driver (`Session`/`Listener`) is
//! responsible for actually scheduling a `tokio::time::Sleep` that delivers
//! the corresponding expiry event back into the FSM's event queue.

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::{Duration, Instant};

/// A timer with a configured duration that can be started, stopped, and
/// polled for expiry.
///
/// Invariant: `running => deadline.is_some()`. A timer configured with zero
/// seconds is permanently disabled: `start` on it is a no-op, matching RFC
/// 4271's treatment of a zero-valued HoldTime or a disabled DelayOpen.
#[derive(Copy, Clone, Debug)]
pub struct Timer {
    name: &'static str,
    configured: Duration,
    deadline: Option<Instant>,
}

impl Timer {
    /// Create a timer with the given configured duration. `seconds = 0`
    /// permanently disables it.
    #[must_use]
    pub fn new(name: &'static str, seconds: u16) -> Self {
        Self {
            name,
            configured: Duration::from_secs(u64::from(seconds)),
            deadline: None,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this timer was configured with a nonzero duration.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.configured.is_zero()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn configured_seconds(&self) -> u64 {
        self.configured.as_secs()
    }

    /// Reconfigure the duration without changing running state. Used when a
    /// timer's length is derived at runtime, e.g. negotiated hold-time.
    pub fn reconfigure(&mut self, seconds: u16) {
        self.configured = Duration::from_secs(u64::from(seconds));
    }

    /// Start (or restart) the timer from now, unless disabled.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Start the timer relative to a caller-supplied instant, so tests can
    /// drive a virtual clock instead of depending on wall time.
    pub fn start_at(&mut self, now: Instant) {
        if self.is_enabled() {
            self.deadline = Some(now + self.configured);
        }
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// True if the timer is running and its deadline has passed `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_timer_never_starts() {
        let mut t = Timer::new("test", 0);
        assert!(!t.is_enabled());
        t.start();
        assert!(!t.is_running());
    }

    #[test]
    fn test_start_stop() {
        let mut t = Timer::new("test", 30);
        assert!(!t.is_running());
        t.start();
        assert!(t.is_running());
        t.stop();
        assert!(!t.is_running());
    }

    #[test]
    fn test_expiry_with_virtual_clock() {
        let mut t = Timer::new("test", 10);
        let t0 = Instant::now();
        t.start_at(t0);
        assert!(!t.is_expired_at(t0 + Duration::from_secs(5)));
        assert!(t.is_expired_at(t0 + Duration::from_secs(10)));
        assert!(t.is_expired_at(t0 + Duration::from_secs(11)));
    }

    #[test]
    fn test_reconfigure_preserves_name() {
        let mut t = Timer::new("hold_time", 90);
        t.reconfigure(60);
        assert_eq!(t.configured_seconds(), 60);
        assert_eq!(t.name(), "hold_time");
    }
}

//! Time source abstraction for token expiry and ledger TTLs.
//!
//! Every expiry decision in the auth core goes through a `TimeSource`, so
//! production uses the system clock while tests advance a manual clock
//! explicitly and observe tokens and ledger records expiring on demand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over time operations.
pub trait TimeSource: Send + Sync {
    /// Get the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;

    /// Get the current time in whole seconds since Unix epoch.
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

/// Real time source using system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    #[allow(clippy::cast_possible_truncation)] // Milliseconds won't overflow u64 for billions of years
    fn now_ms(&self) -> u64 {
        // duration_since(UNIX_EPOCH) only fails if system time is before 1970.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_millis() as u64)
    }
}

/// A manually driven time source.
///
/// Time only moves when `advance` or `set` is called. Unlike a `Cell`-based
/// clock this one is `Sync`, so it can be shared with async handlers through
/// an `Arc`.
///
/// # Example
///
/// ```
/// use auth_server::time::{ManualTimeSource, TimeSource};
///
/// let time = ManualTimeSource::new(1000);
/// assert_eq!(time.now_ms(), 1000);
///
/// time.advance(100);
/// assert_eq!(time.now_ms(), 1100);
/// ```
#[derive(Debug)]
pub struct ManualTimeSource {
    current_time_ms: AtomicU64,
}

impl ManualTimeSource {
    /// Default starting point, roughly November 2023.
    pub const DEFAULT_START_MS: u64 = 1_700_000_000_000;

    #[must_use]
    pub const fn new(initial_time_ms: u64) -> Self {
        Self {
            current_time_ms: AtomicU64::new(initial_time_ms),
        }
    }

    /// Move the clock forward by `delta_ms` milliseconds.
    pub fn advance(&self, delta_ms: u64) {
        self.current_time_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, time_ms: u64) {
        self.current_time_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_START_MS)
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> u64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source() {
        let source = SystemTimeSource;
        let t1 = source.now_ms();
        let t2 = source.now_ms();

        // Time should be reasonable (after 2020)
        assert!(t1 > 1_577_836_800_000);
        assert!(t2 >= t1);
    }

    #[test]
    fn test_manual_time_advance_and_set() {
        let time = ManualTimeSource::new(5_000);
        assert_eq!(time.now_ms(), 5_000);
        assert_eq!(time.now_secs(), 5);

        time.advance(2_500);
        assert_eq!(time.now_ms(), 7_500);
        assert_eq!(time.now_secs(), 7);

        time.set(1_000);
        assert_eq!(time.now_ms(), 1_000);
    }

    #[test]
    fn test_manual_time_default_start() {
        let time = ManualTimeSource::default();
        assert_eq!(time.now_ms(), ManualTimeSource::DEFAULT_START_MS);
    }
}

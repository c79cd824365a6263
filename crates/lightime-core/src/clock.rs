//! Clock sources.
//!
//! Every reading pairs a monotonic value with a wall-clock value. Elapsed
//! time inside a process is measured on the monotonic side; the wall side
//! is what reveals a suspend (the monotonic clock may stop while the
//! machine sleeps) and what survives a process restart.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClockError;

/// Monotonic reading in milliseconds since the clock's origin.
///
/// Only comparable with readings from the same clock instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonoMillis(pub u64);

impl MonoMillis {
    pub fn saturating_since(self, earlier: MonoMillis) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// A paired monotonic + wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub mono: MonoMillis,
    pub wall: DateTime<Utc>,
}

impl Timestamp {
    /// Forward wall-clock distance from `earlier`; zero if the wall clock
    /// went backwards.
    pub fn wall_since(&self, earlier: DateTime<Utc>) -> Duration {
        (self.wall - earlier).to_std().unwrap_or(Duration::ZERO)
    }

    /// Observed gap since an earlier reading: the larger of the monotonic
    /// delta and the forward wall delta.
    pub fn gap_since(&self, mono: MonoMillis, wall: DateTime<Utc>) -> Duration {
        self.mono.saturating_since(mono).max(self.wall_since(wall))
    }
}

/// Source of time for the session core.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Result<Timestamp, ClockError>;
}

/// Process clock backed by `Instant` and `SystemTime`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Result<Timestamp, ClockError> {
        let mono = MonoMillis(self.origin.elapsed().as_millis() as u64);
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ClockError::ReadFailed(e.to_string()))?;
        let wall = DateTime::<Utc>::from_timestamp_millis(since_epoch.as_millis() as i64)
            .ok_or_else(|| ClockError::ReadFailed("wall clock out of range".into()))?;
        Ok(Timestamp { mono, wall })
    }
}

#[derive(Debug)]
struct ManualState {
    mono: MonoMillis,
    wall: DateTime<Utc>,
    failures: u32,
}

/// Hand-driven clock for simulations and tests.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(wall: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                mono: MonoMillis(0),
                wall,
                failures: 0,
            })),
        }
    }

    /// Advance both clocks, as ordinary running time does.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.mono = MonoMillis(state.mono.0 + by.as_millis() as u64);
        state.wall = state.wall + chrono::Duration::milliseconds(by.as_millis() as i64);
    }

    /// Advance only the wall clock, as a system suspend does.
    pub fn suspend(&self, by: Duration) {
        let mut state = self.lock();
        state.wall = state.wall + chrono::Duration::milliseconds(by.as_millis() as i64);
    }

    /// Shift the wall clock by a signed amount (NTP correction, manual change).
    pub fn jump_wall(&self, by: chrono::Duration) {
        let mut state = self.lock();
        state.wall = state.wall + by;
    }

    /// Make the next `count` reads fail.
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failures = count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<Timestamp, ClockError> {
        let mut state = self.lock();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(ClockError::ReadFailed("simulated clock failure".into()));
        }
        Ok(Timestamp {
            mono: state.mono,
            wall: state.wall,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn advance_moves_both_clocks() {
        let clock = ManualClock::new(base());
        let t0 = clock.now().unwrap();
        clock.advance(Duration::from_millis(1500));
        let t1 = clock.now().unwrap();
        assert_eq!(t1.mono.saturating_since(t0.mono), Duration::from_millis(1500));
        assert_eq!(t1.wall_since(t0.wall), Duration::from_millis(1500));
    }

    #[test]
    fn suspend_is_visible_through_the_wall_clock() {
        let clock = ManualClock::new(base());
        let t0 = clock.now().unwrap();
        clock.suspend(Duration::from_secs(600));
        let t1 = clock.now().unwrap();
        assert_eq!(t1.mono, t0.mono);
        assert_eq!(t1.gap_since(t0.mono, t0.wall), Duration::from_secs(600));
    }

    #[test]
    fn backwards_wall_jump_falls_back_to_monotonic() {
        let clock = ManualClock::new(base());
        let t0 = clock.now().unwrap();
        clock.advance(Duration::from_secs(1));
        clock.jump_wall(chrono::Duration::hours(-1));
        let t1 = clock.now().unwrap();
        assert_eq!(t1.gap_since(t0.mono, t0.wall), Duration::from_secs(1));
    }

    #[test]
    fn simulated_failures_are_consumed() {
        let clock = ManualClock::new(base());
        clock.fail_next_reads(2);
        assert!(clock.now().is_err());
        assert!(clock.now().is_err());
        assert!(clock.now().is_ok());
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now().unwrap();
        let b = clock.now().unwrap();
        assert!(b.mono >= a.mono);
    }
}

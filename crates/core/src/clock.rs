//! Monotonic and wall-clock time sources.
//!
//! Deadlines are always computed from the monotonic clock, so wall-clock
//! adjustments never move an already-computed deadline.

use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_delta::{duration_to_us, us_to_duration};

// ── Timestamp ─────────────────────────────────────────────────

/// A point on the monotonic clock, in microseconds since the process anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_micros(us: i64) -> Self {
        Self(us)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Signed microseconds from `earlier` to `self` (negative if `earlier` is later).
    pub fn micros_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        us_to_duration(self.micros_since(earlier))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration_to_us(rhs)))
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(duration_to_us(rhs)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

// ── Free functions ────────────────────────────────────────────

fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

/// Current monotonic time in microseconds.
pub fn steady_time_us() -> i64 {
    duration_to_us(anchor().elapsed())
}

/// Current monotonic time.
pub fn steady_now() -> Timestamp {
    Timestamp(steady_time_us())
}

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn system_time_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// Current wall-clock time.
pub fn system_time() -> DateTime<Utc> {
    Utc::now()
}

// ── Clock trait ───────────────────────────────────────────────

/// A monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The process-wide monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SteadyClock;

impl Clock for SteadyClock {
    fn now(&self) -> Timestamp {
        steady_now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    now_us: AtomicI64,
}

impl SimulatedClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now_us: AtomicI64::new(start.as_micros()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_us.fetch_add(duration_to_us(by), Ordering::SeqCst);
    }

    pub fn set(&self, to: Timestamp) {
        self.now_us.store(to.as_micros(), Ordering::SeqCst);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now_us.load(Ordering::SeqCst))
    }
}

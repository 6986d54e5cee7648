use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock timestamp with a logical tie-breaker.
///
/// Ordering: `physical_ms` then `logical`. [`Timestamp::tick`] yields a
/// timestamp strictly after its receiver even when the wall clock has not
/// moved (or moved backwards), so commits appended in sequence always have
/// strictly increasing timestamps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events within the same millisecond.
    pub logical: u32,
}

impl Timestamp {
    pub const fn new(physical_ms: u64, logical: u32) -> Self {
        Self {
            physical_ms,
            logical,
        }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::new(wall_clock_ms(), 0)
    }

    /// The zero timestamp (before everything).
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// The next timestamp strictly after `self`, tracking the wall clock.
    pub fn tick(&self) -> Self {
        let now_ms = wall_clock_ms();
        if now_ms > self.physical_ms {
            Self::new(now_ms, 0)
        } else {
            Self::new(self.physical_ms, self.logical + 1)
        }
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms.{})", self.physical_ms, self.logical)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.physical_ms, self.logical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_physical_first() {
        assert!(Timestamp::new(100, 5) < Timestamp::new(200, 0));
    }

    #[test]
    fn ordering_logical_second() {
        assert!(Timestamp::new(100, 1) < Timestamp::new(100, 2));
    }

    #[test]
    fn tick_is_strictly_monotonic() {
        let mut t = Timestamp::now();
        for _ in 0..100 {
            let next = t.tick();
            assert!(next.is_after(&t));
            t = next;
        }
    }

    #[test]
    fn tick_from_the_future_uses_logical_counter() {
        let future = Timestamp::new(u64::MAX / 2, 3);
        assert_eq!(future.tick(), Timestamp::new(u64::MAX / 2, 4));
    }

    #[test]
    fn zero_is_smallest() {
        assert!(Timestamp::zero().is_before(&Timestamp::new(1, 0)));
    }

    #[test]
    fn display_format() {
        assert_eq!(Timestamp::new(1000, 5).to_string(), "1000.5");
    }
}

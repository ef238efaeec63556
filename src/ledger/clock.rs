//! Ledger time source and slot sequencing

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Source of the ledger's current time in unix seconds.
pub trait Clock: Send + Sync {
    /// Current unix timestamp.
    fn unix_timestamp(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    /// Clock frozen at `timestamp`.
    #[must_use]
    pub const fn new(timestamp: i64) -> Self {
        Self(AtomicI64::new(timestamp))
    }

    /// Jump to `timestamp`.
    pub fn set(&self, timestamp: i64) {
        self.0.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn unix_timestamp(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Slot and time assigned to one accepted invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Position in the ledger's total order.
    pub slot: u64,
    /// Ledger time (unix seconds).
    pub unix_timestamp: i64,
}

/// Hands out slots in admission order, each paired with the current time.
///
/// The processor draws a stamp while it holds the record's lock, so stamps
/// on one record follow the order its mutations were applied in.
pub struct Sequencer {
    clock: Arc<dyn Clock>,
    next_slot: AtomicU64,
}

impl Sequencer {
    /// Sequencer starting at slot 0.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_slot: AtomicU64::new(0),
        }
    }

    /// Draw the next slot and read the clock.
    pub fn next_stamp(&self) -> Stamp {
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst);
        Stamp {
            slot,
            unix_timestamp: self.clock.unix_timestamp(),
        }
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("next_slot", &self.next_slot.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_positive() {
        assert!(SystemClock.unix_timestamp() > 0);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(10);
        assert_eq!(clock.unix_timestamp(), 10);
        clock.advance(5);
        assert_eq!(clock.unix_timestamp(), 15);
        clock.set(1);
        assert_eq!(clock.unix_timestamp(), 1);
    }

    #[test]
    fn test_sequencer_stamps() {
        let clock = Arc::new(FixedClock::new(50));
        let sequencer = Sequencer::new(clock.clone());
        let first = sequencer.next_stamp();
        clock.advance(2);
        let second = sequencer.next_stamp();
        assert_eq!(first, Stamp { slot: 0, unix_timestamp: 50 });
        assert_eq!(second, Stamp { slot: 1, unix_timestamp: 52 });
    }
}

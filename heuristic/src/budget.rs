//! Wall-clock and memory-pressure termination signal polled cooperatively by the
//! CEGAR loop and by the oracle's search phases.
//!
//! The original source reserves a padding of memory up front and treats an
//! allocation failure as the signal to stop; there is no portable way to express
//! that in safe Rust, so this is a flag toggled explicitly instead, with
//! [`Budget::release_memory_padding`] standing in for "the reservation failed" so
//! tests can simulate memory pressure deterministically.

use std::cell::Cell;
use std::time::{Duration, Instant};

pub struct Budget {
    start: Instant,
    max_time: Option<Duration>,
    memory_padding_mb: u64,
    memory_pressure: Cell<bool>,
}

impl Budget {
    pub fn new(max_time: Option<Duration>, memory_padding_mb: u64) -> Budget {
        Budget {
            start: Instant::now(),
            max_time,
            memory_padding_mb,
            memory_pressure: Cell::new(false),
        }
    }

    pub fn memory_padding_mb(&self) -> u64 {
        self.memory_padding_mb
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.memory_pressure.get() || self.max_time.is_some_and(|max| self.start.elapsed() >= max)
    }

    /// Simulates the host releasing its reserved memory padding under pressure.
    pub fn release_memory_padding(&self) {
        self.memory_pressure.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_expired_without_a_deadline_or_pressure() {
        let budget = Budget::new(None, 75);
        assert!(!budget.is_expired());
    }

    #[test]
    fn expires_immediately_with_a_zero_deadline() {
        let budget = Budget::new(Some(Duration::from_secs(0)), 75);
        assert!(budget.is_expired());
    }

    #[test]
    fn release_memory_padding_forces_expiry() {
        let budget = Budget::new(None, 75);
        assert!(!budget.is_expired());
        budget.release_memory_padding();
        assert!(budget.is_expired());
    }
}

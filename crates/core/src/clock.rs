//! Injectable time source.
//!
//! Entity transitions take `now` as an argument; callers obtain it from a
//! [`Clock`] so that tests can pin time with [`FixedClock`].

use std::sync::Mutex;

use crate::types::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// A clock that returns a pinned instant until advanced.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<Timestamp>,
}

impl FixedClock {
    pub fn new(at: Timestamp) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += delta;
    }

    pub fn set(&self, at: Timestamp) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

//! Interruptible per-row read delay

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// The pause was cut short by [`ReadDelay::interrupt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("read delay interrupted")]
pub struct Interrupted;

/// Blocking pause applied between rows that another thread can cut short.
///
/// An interrupt requested while no pause is pending is remembered and ends
/// the next pause immediately. Each interrupt ends exactly one pause.
#[derive(Debug, Default)]
pub struct ReadDelay {
    interrupted: Mutex<bool>,
    signal: Condvar,
}

impl ReadDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block the calling thread for `duration` unless interrupted first
    pub fn pause(&self, duration: Duration) -> Result<(), Interrupted> {
        if duration.is_zero() {
            return Ok(());
        }

        let deadline = Instant::now() + duration;
        let mut interrupted = self.interrupted.lock();
        loop {
            if *interrupted {
                *interrupted = false;
                return Err(Interrupted);
            }
            if self.signal.wait_until(&mut interrupted, deadline).timed_out() {
                if *interrupted {
                    *interrupted = false;
                    return Err(Interrupted);
                }
                return Ok(());
            }
        }
    }

    /// Cut the current (or next) pause short
    pub fn interrupt(&self) {
        *self.interrupted.lock() = true;
        self.signal.notify_all();
    }
}

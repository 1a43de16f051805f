//! Blocking waits between planning attempts.

use std::thread;
use std::time::Duration;

/// Abstraction over sleeping so backoff schedules are testable.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

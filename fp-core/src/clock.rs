//! Monotonic time abstraction and periodic-task scheduling
//!
//! Both control loops pace themselves off one monotonic clock. The trait
//! exists so the loops can be driven by a virtual clock in tests; production
//! code always uses [`MonotonicClock`].
//!
//! [`Cadence`] multiplexes several periodic tasks over a single ticking
//! loop: each task fires when the integer second counter crosses into a new
//! period. Unlike a raw `timestamp % N == 0` check, a boundary that gets
//! jumped over (the 2-second sampling burst can advance the counter by 3)
//! still fires exactly once.

use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source plus blocking sleep
pub trait Clock: Send {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;

    /// Block the current thread for the given duration
    fn sleep(&self, duration: Duration);

    /// Whole seconds since the origin
    fn now_secs(&self) -> u64 {
        self.now().as_secs()
    }
}

/// Wall-clock implementation backed by [`Instant`]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Due-predicate for one periodic task driven off a shared second counter
///
/// The first call arms the cadence without firing, so a task waits for the
/// next period boundary after startup rather than running immediately.
#[derive(Debug)]
pub struct Cadence {
    period_s: u64,
    last_fired: Option<u64>,
}

impl Cadence {
    /// Create a cadence firing once per `period_s` seconds
    pub fn new(period_s: u64) -> Self {
        assert!(period_s > 0, "cadence period must be positive");
        Self {
            period_s,
            last_fired: None,
        }
    }

    /// True exactly once per period boundary crossed since the last call
    pub fn due(&mut self, now_s: u64) -> bool {
        let index = now_s / self.period_s;
        match self.last_fired {
            None => {
                self.last_fired = Some(index);
                false
            }
            Some(last) if index > last => {
                self.last_fired = Some(index);
                true
            }
            Some(_) => false,
        }
    }
}

/// Shared, manually advanced clock for loop tests
#[cfg(test)]
#[derive(Clone)]
pub struct ManualClock(std::sync::Arc<std::sync::Mutex<Duration>>);

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(Duration::ZERO)))
    }

    pub fn set(&self, now: Duration) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.0.lock().unwrap()
    }

    // Sleeping just advances virtual time
    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

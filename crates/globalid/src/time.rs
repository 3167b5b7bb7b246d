use crate::Result;
use core::time::Duration;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Length of one issuance window.
pub const ONE_SECOND_MILLIS: u64 = 1000;

/// A trait for time sources that return wall-clock milliseconds since the
/// Unix epoch.
///
/// This abstraction allows you to plug in the system clock, a monotonic clock,
/// or a mocked time source in tests.
///
/// # Example
///
/// ```
/// use globalid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since 1970-01-01 UTC.
    fn current_millis(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

/// The system wall clock.
///
/// Subject to NTP slews and manual adjustments. If the clock steps backward
/// the generator logs a warning but keeps issuing; see [`MonotonicClock`] for
/// a source that cannot regress.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        // A clock set before 1970 reads as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

/// A time source anchored to the wall clock once, then advanced by
/// [`Instant`].
///
/// Readings never go backward for the life of the value, even if the system
/// clock is stepped. The cost is drift: the clock does not follow later
/// corrections to wall time.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    anchor_millis: u64,
    start: Instant,
}

impl MonotonicClock {
    /// Captures the current wall-clock time as the anchor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            anchor_millis: SystemClock.current_millis(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn current_millis(&self) -> u64 {
        self.anchor_millis + self.start.elapsed().as_millis() as u64
    }
}

/// A trait that abstracts over how the generator blocks the calling thread.
///
/// Returning an error means the wait did not run to completion. The
/// generator surfaces it as fatal and does not retry.
pub trait SleepProvider {
    /// Blocks for `dur`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] if the wait was cut short.
    ///
    /// [`Error::Interrupted`]: crate::Error::Interrupted
    fn sleep_for(&self, dur: Duration, context: &'static str) -> Result<()>;
}

impl<S: SleepProvider + ?Sized> SleepProvider for &S {
    fn sleep_for(&self, dur: Duration, context: &'static str) -> Result<()> {
        (**self).sleep_for(dur, context)
    }
}

/// Sleeps with [`std::thread::sleep`], which cannot be interrupted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleep;

impl SleepProvider for ThreadSleep {
    fn sleep_for(&self, dur: Duration, _context: &'static str) -> Result<()> {
        std::thread::sleep(dur);
        Ok(())
    }
}

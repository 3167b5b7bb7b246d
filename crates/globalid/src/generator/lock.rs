use core::time::Duration;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, GlobalId, NodeIdSource, ONE_SECOND_MILLIS, Result, SleepProvider, SystemClock,
    ThreadSleep, TimeSource,
    generator::{Mutex, MutexGuard},
};

/// Mutable generator state. Guarded by a single mutex so every read-modify-write
/// of an issuance happens as one critical section.
#[derive(Debug, Default)]
struct State {
    /// `None` until `initialize` completes.
    node_id: Option<u16>,
    /// Serial to attach to the next ID in the current window.
    next_serial: u64,
    /// Wall-clock millis at which the current window began.
    interval_start: u64,
    /// Wall-clock millis of the most recent issuance.
    last_id_timestamp: u64,
}

impl State {
    /// Issuance stops one short of the field maximum, so serial `2^17 - 1` is
    /// never handed out.
    const SERIAL_LIMIT: u64 = GlobalId::max_serial();

    fn is_exhausted(&self) -> bool {
        self.next_serial >= Self::SERIAL_LIMIT
    }

    /// A window ends once no ID has been issued for a full second, or once the
    /// wall clock has entered a later epoch second than the one the window
    /// began in. The packed second then never trails issuance by a full
    /// second, and each new window still starts in a strictly later second.
    fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.last_id_timestamp) > ONE_SECOND_MILLIS
            || now / ONE_SECOND_MILLIS > self.interval_start / ONE_SECOND_MILLIS
    }

    fn start_window(&mut self, now: u64) {
        self.interval_start = now;
        self.next_serial = 0;
    }
}

/// A lock-based generator of [`GlobalId`]s, safe to share across threads.
///
/// The state lives in an [`Arc<Mutex<_>>`]; clones share it, so a single
/// generator can be handed to every caller on the node. At most one caller
/// runs the issuance critical section at a time.
///
/// ## Backpressure
///
/// When a window's serials are exhausted, the caller that notices sleeps until
/// the window's second is over **while holding the lock**. Every other caller
/// queues behind it and they all resume in the same fresh window. This bounds
/// worst-case latency to about one second without any queueing or retry
/// machinery.
///
/// ## Lifecycle
///
/// 1. Construct with [`GlobalIdGenerator::new`] (or `default()`).
/// 2. Call [`GlobalIdGenerator::initialize`] once. It blocks for one second.
/// 3. Call [`GlobalIdGenerator::try_next_id`] from any number of threads.
///
/// # Example
/// ```
/// use globalid::{FixedNodeId, GlobalIdGenerator};
///
/// let generator = GlobalIdGenerator::default();
/// generator.initialize(&FixedNodeId(42))?;
///
/// let id = generator.try_next_id()?;
/// assert_eq!(id.node_id(), 42);
/// # Ok::<(), globalid::Error>(())
/// ```
pub struct GlobalIdGenerator<T = SystemClock, S = ThreadSleep>
where
    T: TimeSource,
    S: SleepProvider,
{
    state: Arc<Mutex<State>>,
    time: T,
    sleep: S,
}

impl Default for GlobalIdGenerator {
    fn default() -> Self {
        Self::new(SystemClock, ThreadSleep)
    }
}

impl<T, S> Clone for GlobalIdGenerator<T, S>
where
    T: TimeSource + Clone,
    S: SleepProvider + Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            time: self.time.clone(),
            sleep: self.sleep.clone(),
        }
    }
}

impl<T, S> GlobalIdGenerator<T, S>
where
    T: TimeSource,
    S: SleepProvider,
{
    /// Creates an uninitialized generator.
    ///
    /// # Parameters
    ///
    /// - `time`: A [`TimeSource`] returning milliseconds since the Unix epoch
    ///   (e.g., [`SystemClock`] or [`MonotonicClock`]).
    /// - `sleep`: The [`SleepProvider`] used for the startup delay and for
    ///   waiting out an exhausted window.
    ///
    /// [`MonotonicClock`]: crate::MonotonicClock
    pub fn new(time: T, sleep: S) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            time,
            sleep,
        }
    }

    /// Assigns the node ID and then blocks for one second.
    ///
    /// The delay guarantees that a restarted node (crash, deploy or reboot)
    /// cannot reissue an epoch second it used before going down. The lock is
    /// held throughout, so callers of [`Self::try_next_id`] that race with
    /// initialization wait for it and then succeed.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInitialized`] if a node ID is already assigned. The
    ///   existing assignment is kept and no delay is performed.
    /// - [`Error::NodeIdOutOfRange`] if `source` yields a value above
    ///   [`GlobalId::max_node_id`].
    /// - Any error returned by `source`.
    /// - [`Error::Interrupted`] if the startup delay is cut short. The
    ///   generator stays uninitialized.
    /// - [`Error::LockPoisoned`] if another thread panicked while holding
    ///   the lock (std mutex only).
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, source)))]
    pub fn initialize<N>(&self, source: &N) -> Result<()>
    where
        N: NodeIdSource + ?Sized,
    {
        let mut state = self.lock()?;
        if state.node_id.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let node_id = source.node_id()?;
        let max = GlobalId::max_node_id() as u16;
        if node_id > max {
            return Err(Error::NodeIdOutOfRange { node_id, max });
        }

        self.wait(ONE_SECOND_MILLIS, "initial startup")?;
        state.node_id = Some(node_id);

        #[cfg(feature = "tracing")]
        tracing::info!("GlobalId generator for node {} initialized", node_id);
        Ok(())
    }

    /// Issues the next ID.
    ///
    /// Never blocks while fewer than `2^17 - 1` IDs are requested per second.
    /// Past that, the caller sleeps (holding the lock) until the current
    /// window's second has elapsed, at most one second.
    ///
    /// The epoch second packed into the ID is the second in which the current
    /// window began. Once the wall clock enters the next second a fresh window
    /// starts, so the packed second stays within one second of issuance.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if [`Self::initialize`] has not completed.
    /// - [`Error::Interrupted`] if the window-exhaustion wait is cut short.
    ///   No ID is issued and the window stays exhausted.
    /// - [`Error::LockPoisoned`] if another thread panicked while holding
    ///   the lock (std mutex only).
    ///
    /// # Example
    /// ```
    /// use globalid::{FixedNodeId, GlobalIdGenerator};
    ///
    /// let generator = GlobalIdGenerator::default();
    /// assert!(generator.try_next_id().is_err());
    ///
    /// generator.initialize(&FixedNodeId(1))?;
    /// let a = generator.try_next_id()?;
    /// let b = generator.try_next_id()?;
    /// assert_ne!(a, b);
    /// # Ok::<(), globalid::Error>(())
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_next_id(&self) -> Result<GlobalId> {
        let mut state = self.lock()?;
        let node_id = state.node_id.ok_or(Error::NotInitialized)?;

        let mut now = self.time.current_millis();
        if now < state.last_id_timestamp {
            Self::cold_clock_behind(now, state.last_id_timestamp);
        }

        if state.is_exhausted() {
            now = self.cold_wait_for_next_window(now, state.interval_start)?;
            state.start_window(now);
        } else if state.is_expired(now) {
            state.start_window(now);
        }
        state.last_id_timestamp = now;

        let serial = state.next_serial;
        state.next_serial += 1;

        Ok(GlobalId::from_components(
            u64::from(node_id),
            state.interval_start / ONE_SECOND_MILLIS,
            serial,
        ))
    }

    /// Returns the node ID assigned by [`Self::initialize`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if [`Self::initialize`] has not completed.
    /// - [`Error::LockPoisoned`] if the lock is poisoned (std mutex only).
    pub fn node_id(&self) -> Result<u16> {
        self.lock()?.node_id.ok_or(Error::NotInitialized)
    }

    /// Returns `true` once [`Self::initialize`] has completed.
    pub fn is_initialized(&self) -> bool {
        self.node_id().is_ok()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.state.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.state.lock()?)
        }
    }

    fn wait(&self, millis: u64, context: &'static str) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Sleeping for {} msec ({})", millis, context);
        self.sleep.sleep_for(Duration::from_millis(millis), context)
    }

    /// Sleeps out the remainder of the exhausted window and returns the fresh
    /// timestamp the next window starts at.
    #[cold]
    #[inline(never)]
    fn cold_wait_for_next_window(&self, now: u64, interval_start: u64) -> Result<u64> {
        let elapsed = now.saturating_sub(interval_start);
        let delay = ONE_SECOND_MILLIS.saturating_sub(elapsed);
        if delay > 0 {
            self.wait(delay, "overflow")?;
        }
        Ok(self.time.current_millis())
    }

    /// The clock stepped backward. IDs keep flowing, but the epoch second may
    /// regress and collide with one already issued.
    #[cold]
    #[inline(never)]
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn cold_clock_behind(now: u64, last: u64) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            "Clock moved backward by {} msec (now {}, last issued at {})",
            last - now,
            now,
            last
        );
    }
}

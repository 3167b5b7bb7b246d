/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `globalid` can produce.
///
/// Every variant signals a violated precondition rather than a transient
/// condition. None of them are retried internally and callers are expected to
/// treat them as fatal for the process that observed them.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An ID was requested before [`GlobalIdGenerator::initialize`] finished.
    ///
    /// [`GlobalIdGenerator::initialize`]: crate::GlobalIdGenerator::initialize
    #[error("generator has not been initialized")]
    NotInitialized,

    /// [`GlobalIdGenerator::initialize`] was called on a generator that
    /// already has a node id.
    ///
    /// [`GlobalIdGenerator::initialize`]: crate::GlobalIdGenerator::initialize
    #[error("generator is already initialized")]
    AlreadyInitialized,

    /// The node id source returned a value that does not fit the 10-bit field.
    #[error("node id {node_id} exceeds the maximum of {max}")]
    NodeIdOutOfRange {
        /// The rejected value.
        node_id: u16,
        /// The largest node id the layout can hold.
        max: u16,
    },

    /// A mandatory wait was cut short by the environment.
    ///
    /// A partial wait could let a restarted node reuse a second it already
    /// issued from, so the wait is never resumed.
    #[error("interrupted during sleep [{context}]")]
    Interrupted {
        /// Which wait was interrupted (`"initial startup"` or `"overflow"`).
        context: &'static str,
    },

    /// The generator's lock was poisoned by a panicking thread.
    ///
    /// Only present with the std mutex; `parking_lot` mutexes do not poison.
    #[cfg(not(feature = "parking-lot"))]
    #[error("generator lock poisoned")]
    LockPoisoned,

    /// A signed value below zero can never be a valid ID.
    #[error("negative value {0} is not a valid id")]
    NegativeId(i64),

    /// The reserved sign bit (bit 63) is set.
    #[error("value {0:#x} has the reserved bit set")]
    ReservedBitSet(u64),
}

#[cfg(not(feature = "parking-lot"))]
use std::sync::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

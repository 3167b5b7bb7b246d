use crate::{Error, ONE_SECOND_MILLIS};
use core::fmt;

/// A 64-bit globally unique identifier.
///
/// - 1 bit reserved (always zero, so the value is non-negative as an `i64`)
/// - 10 bits node ID
/// - 36 bits whole seconds since the Unix epoch
/// - 17 bits serial number within that second
///
/// ```text
///  Bit Index:  63           63 62           53 52             17 16            0
///              +--------------+---------------+-----------------+--------------+
///  Field:      | reserved (1) | node ID (10)  |  seconds (36)   |  serial (17) |
///              +--------------+---------------+-----------------+--------------+
///              |<----------- MSB ---------- 64 bits ----------- LSB ----------->|
/// ```
///
/// Callers should treat the value as opaque; the accessors exist for
/// diagnostics and tests.
///
/// # Example
///
/// ```
/// use globalid::GlobalId;
///
/// let id = GlobalId::from_components(7, 1_700_000_000, 42);
/// assert_eq!(id.node_id(), 7);
/// assert_eq!(id.seconds(), 1_700_000_000);
/// assert_eq!(id.serial(), 42);
/// assert!(i64::from(id) >= 0);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId {
    id: u64,
}

impl GlobalId {
    /// Width of the node ID field.
    pub const NODE_ID_BITS: u32 = 10;

    /// Width of the epoch-second field.
    pub const SECONDS_BITS: u32 = 36;

    /// Width of the serial number field.
    pub const SERIAL_BITS: u32 = 17;

    /// Bitmask for extracting the 10-bit node ID field. Occupies bits 53
    /// through 62.
    pub const NODE_ID_MASK: u64 = (1 << Self::NODE_ID_BITS) - 1;

    /// Bitmask for extracting the 36-bit seconds field. Occupies bits 17
    /// through 52.
    pub const SECONDS_MASK: u64 = (1 << Self::SECONDS_BITS) - 1;

    /// Bitmask for extracting the 17-bit serial field. Occupies bits 0 through
    /// 16.
    pub const SERIAL_MASK: u64 = (1 << Self::SERIAL_BITS) - 1;

    /// Number of bits to shift the node ID to its correct position (bit 53).
    pub const NODE_ID_SHIFT: u32 = Self::SECONDS_BITS + Self::SERIAL_BITS;

    /// Number of bits to shift the seconds field to its correct position (bit
    /// 17).
    pub const SECONDS_SHIFT: u32 = Self::SERIAL_BITS;

    /// Number of bits to shift the serial field (bit 0).
    pub const SERIAL_SHIFT: u32 = 0;

    /// The reserved sign bit.
    pub const RESERVED_BIT: u64 = 1 << 63;

    /// Packs the three fields into an ID. Out-of-range inputs are truncated
    /// to their field width, so the reserved bit can never be set.
    #[must_use]
    pub const fn from_components(node_id: u64, seconds: u64, serial: u64) -> Self {
        let node_id = (node_id & Self::NODE_ID_MASK) << Self::NODE_ID_SHIFT;
        let seconds = (seconds & Self::SECONDS_MASK) << Self::SECONDS_SHIFT;
        let serial = (serial & Self::SERIAL_MASK) << Self::SERIAL_SHIFT;
        Self {
            id: node_id | seconds | serial,
        }
    }

    /// Extracts the node ID.
    #[must_use]
    pub const fn node_id(&self) -> u64 {
        (self.id >> Self::NODE_ID_SHIFT) & Self::NODE_ID_MASK
    }

    /// Extracts the whole seconds since the Unix epoch.
    #[must_use]
    pub const fn seconds(&self) -> u64 {
        (self.id >> Self::SECONDS_SHIFT) & Self::SECONDS_MASK
    }

    /// Extracts the serial number.
    #[must_use]
    pub const fn serial(&self) -> u64 {
        (self.id >> Self::SERIAL_SHIFT) & Self::SERIAL_MASK
    }

    /// The start of the issuing second, in milliseconds since the Unix epoch.
    #[must_use]
    pub const fn timestamp_millis(&self) -> u64 {
        self.seconds() * ONE_SECOND_MILLIS
    }

    /// Returns the largest node ID the layout can hold.
    #[must_use]
    pub const fn max_node_id() -> u64 {
        Self::NODE_ID_MASK
    }

    /// Returns the largest seconds value the layout can hold.
    #[must_use]
    pub const fn max_seconds() -> u64 {
        Self::SECONDS_MASK
    }

    /// Returns the largest serial value the layout can hold.
    #[must_use]
    pub const fn max_serial() -> u64 {
        Self::SERIAL_MASK
    }

    /// Returns the packed integer.
    #[must_use]
    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Wraps a packed integer without validation.
    ///
    /// Use [`TryFrom<u64>`] to reject values with the reserved bit set.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }
}

impl From<GlobalId> for u64 {
    fn from(id: GlobalId) -> Self {
        id.to_raw()
    }
}

impl From<GlobalId> for i64 {
    fn from(id: GlobalId) -> Self {
        // Bit 63 is never set by `from_components`, but `from_raw` is
        // unchecked, so mask rather than cast.
        (id.to_raw() & !GlobalId::RESERVED_BIT) as i64
    }
}

impl TryFrom<u64> for GlobalId {
    type Error = Error;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        if raw & Self::RESERVED_BIT != 0 {
            return Err(Error::ReservedBitSet(raw));
        }
        Ok(Self::from_raw(raw))
    }
}

impl TryFrom<i64> for GlobalId {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u64::try_from(raw)
            .map(Self::from_raw)
            .map_err(|_| Error::NegativeId(raw))
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalId")
            .field("id", &self.id)
            .field("node_id", &self.node_id())
            .field("seconds", &self.seconds())
            .field("serial", &self.serial())
            .finish()
    }
}

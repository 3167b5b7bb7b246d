use crate::Result;

/// The node ID used when nothing else has been configured.
pub const DEFAULT_NODE_ID: u16 = 1023;

/// Supplies the node ID a generator stamps into every ID it issues.
///
/// The value must be unique across every process running at the same time.
/// Nothing in this crate checks that; an implementation backed by a
/// coordination service or a claim protocol is expected to.
///
/// Closures returning `Result<u16>` implement this trait, so an allocation
/// mechanism can be plugged in without a new type:
///
/// ```
/// use globalid::{NodeIdSource, Result};
///
/// let from_config = || -> Result<u16> { Ok(17) };
/// assert_eq!(from_config.node_id(), Ok(17));
/// ```
pub trait NodeIdSource {
    /// Returns this process's node ID.
    ///
    /// # Errors
    ///
    /// Implementations return an error if no ID could be obtained.
    fn node_id(&self) -> Result<u16>;
}

impl<F> NodeIdSource for F
where
    F: Fn() -> Result<u16>,
{
    fn node_id(&self) -> Result<u16> {
        self()
    }
}

/// A hard-coded node ID.
///
/// Suitable for tests and single-node deployments. Fleets must hand each
/// process a distinct value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixedNodeId(pub u16);

impl Default for FixedNodeId {
    fn default() -> Self {
        Self(DEFAULT_NODE_ID)
    }
}

impl NodeIdSource for FixedNodeId {
    fn node_id(&self) -> Result<u16> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn default_is_the_placeholder() {
        assert_eq!(FixedNodeId::default().node_id(), Ok(1023));
    }

    #[test]
    fn closures_are_sources() {
        let failing = || -> Result<u16> { Err(Error::NotInitialized) };
        assert_eq!(failing.node_id(), Err(Error::NotInitialized));
    }
}

//! Strongly-typed identifiers.
//!
//! Following `TigerStyle`: a segment number can't be passed where a log
//! index is expected.

use std::fmt;

/// Identifier of a processing segment of a tracking consumer.
///
/// A consumer splits the log into segments and processes each on its own
/// task; every segment commits its own position.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SegmentId(u64);

impl SegmentId {
    /// Creates a segment id from its number.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the segment number.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment({})", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment-{}", self.0)
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_segment_display() {
        let segment = SegmentId::new(42);
        assert_eq!(format!("{segment}"), "segment-42");
        assert_eq!(format!("{segment:?}"), "segment(42)");
    }

    #[test]
    fn test_segment_as_map_key() {
        let mut positions = HashMap::new();
        positions.insert(SegmentId::new(0), 10u64);
        positions.insert(SegmentId::from(1), 20u64);

        assert_eq!(positions[&SegmentId::new(1)], 20);
        assert!(SegmentId::new(0) < SegmentId::new(1));
        assert_eq!(SegmentId::new(7).get(), 7);
    }
}

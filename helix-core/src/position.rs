//! Gap-aware positions in an ordered event log.
//!
//! A log whose indexes come from a sequence allocator can be read with holes:
//! index 7 may be visible before index 6 has committed. A [`Position`]
//! records the highest index a reader has seen together with the set of
//! lower indexes it has *not* seen yet (its gaps), so a later read can pick
//! those up once they appear.
//!
//! Positions compare, equal and hash by index only. Two readers at the same
//! index are equally far along even if their gap sets differ.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use roaring::RoaringTreemap;

use crate::error::{Error, Result};

/// A gap-aware position in an ordered event log.
#[derive(Clone, Default)]
pub struct Position {
    /// Highest index seen.
    index: u64,
    /// Indexes below `index` that have not been seen yet.
    gaps: RoaringTreemap,
}

impl Position {
    /// Creates a position at `index` with no gaps.
    #[must_use]
    pub fn new(index: u64) -> Self {
        Self {
            index,
            gaps: RoaringTreemap::new(),
        }
    }

    /// Creates the position of a reader whose first event is at `index`.
    ///
    /// Every lower index within `max_gap_offset` is unseen and becomes a gap.
    #[must_use]
    pub fn first_seen(index: u64, max_gap_offset: u64) -> Self {
        let mut gaps = RoaringTreemap::new();
        gaps.insert_range(index.saturating_sub(max_gap_offset)..index);
        Self { index, gaps }
    }

    /// Creates a position at `index` with the given gaps.
    ///
    /// # Errors
    ///
    /// Returns `GapNotBelowIndex` if any gap is not strictly below `index`.
    pub fn with_gaps(index: u64, gaps: impl IntoIterator<Item = u64>) -> Result<Self> {
        let mut set = RoaringTreemap::new();
        for gap in gaps {
            if gap >= index {
                return Err(Error::GapNotBelowIndex { gap, index });
            }
            set.insert(gap);
        }
        Ok(Self { index, gaps: set })
    }

    /// Returns the highest index seen.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Returns the indexes below [`index`](Self::index) not seen yet.
    #[must_use]
    pub const fn gaps(&self) -> &RoaringTreemap {
        &self.gaps
    }

    /// Returns true if any index below this position is still missing.
    #[must_use]
    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// Returns the number of missing indexes below this position.
    #[must_use]
    pub fn gap_count(&self) -> u64 {
        self.gaps.len()
    }

    /// Returns true if the event at `index` has already been seen.
    #[must_use]
    pub fn covers(&self, index: u64) -> bool {
        index <= self.index && !self.gaps.contains(index)
    }

    /// Returns the position after also seeing the event at `index`.
    ///
    /// Moving past the current index turns every skipped index into a gap.
    /// Seeing an index that was a gap fills it. Gaps more than
    /// `max_gap_offset` below the resulting index are given up on.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCovered` if `index` was seen before.
    pub fn advance_to(&self, index: u64, max_gap_offset: u64) -> Result<Self> {
        let mut gaps = self.gaps.clone();

        let new_index = if index > self.index {
            if index - self.index > 1 {
                gaps.insert_range(self.index + 1..index);
            }
            index
        } else if gaps.remove(index) {
            self.index
        } else {
            return Err(Error::AlreadyCovered {
                index,
                position: self.index,
            });
        };

        let floor = new_index.saturating_sub(max_gap_offset);
        if floor > 0 {
            gaps.remove_range(..floor);
        }

        let position = Self {
            index: new_index,
            gaps,
        };

        // TigerStyle: Assert postconditions.
        assert!(position.covers(index));
        assert!(position.index >= self.index);
        Ok(position)
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Position {}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Position")
            .field("index", &self.index)
            .field("gaps", &self.gaps.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_gaps() {
            write!(f, "{} (gaps: {})", self.index, self.gap_count())
        } else {
            write!(f, "{}", self.index)
        }
    }
}

impl From<u64> for Position {
    fn from(index: u64) -> Self {
        Self::new(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TRIM: u64 = u64::MAX;

    #[test]
    fn test_with_gaps_rejects_gap_at_index() {
        let err = Position::with_gaps(10, [3, 10]).unwrap_err();
        assert_eq!(err, Error::GapNotBelowIndex { gap: 10, index: 10 });
    }

    #[test]
    fn test_first_seen() {
        let position = Position::first_seen(0, 100);
        assert_eq!(position.index(), 0);
        assert!(!position.has_gaps());

        let position = Position::first_seen(5, 3);
        assert_eq!(position.gaps().iter().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(position.covers(1));
        assert!(!position.covers(2));
    }

    #[test]
    fn test_covers() {
        let position = Position::with_gaps(10, [4, 7]).unwrap();

        assert!(position.covers(0));
        assert!(position.covers(10));
        assert!(!position.covers(4));
        assert!(!position.covers(7));
        assert!(!position.covers(11));
    }

    #[test]
    fn test_advance_contiguous() {
        let position = Position::new(5).advance_to(6, NO_TRIM).unwrap();

        assert_eq!(position.index(), 6);
        assert!(!position.has_gaps());
    }

    #[test]
    fn test_advance_records_skipped_indexes() {
        let position = Position::new(5).advance_to(9, NO_TRIM).unwrap();

        assert_eq!(position.index(), 9);
        assert_eq!(position.gaps().iter().collect::<Vec<_>>(), vec![6, 7, 8]);
    }

    #[test]
    fn test_advance_fills_gap() {
        let position = Position::with_gaps(9, [6, 7, 8])
            .unwrap()
            .advance_to(7, NO_TRIM)
            .unwrap();

        assert_eq!(position.index(), 9);
        assert_eq!(position.gaps().iter().collect::<Vec<_>>(), vec![6, 8]);
    }

    #[test]
    fn test_advance_rejects_covered_index() {
        let position = Position::with_gaps(9, [6]).unwrap();

        let err = position.advance_to(3, NO_TRIM).unwrap_err();
        assert_eq!(
            err,
            Error::AlreadyCovered {
                index: 3,
                position: 9
            }
        );
        assert!(position.advance_to(9, NO_TRIM).is_err());
    }

    #[test]
    fn test_advance_trims_old_gaps() {
        let position = Position::with_gaps(10, [2, 8])
            .unwrap()
            .advance_to(20, 15)
            .unwrap();

        // Gap 2 is more than 15 below 20; 8 and the new 11..20 stay.
        assert!(!position.gaps().contains(2));
        assert!(position.gaps().contains(8));
        assert!(position.gaps().contains(11));
        assert!(position.gaps().contains(19));
        assert_eq!(position.gap_count(), 10);
    }

    #[test]
    fn test_ordering_ignores_gaps() {
        let plain = Position::new(10);
        let gapped = Position::with_gaps(10, [1, 2, 3]).unwrap();
        let ahead = Position::new(11);

        assert_eq!(plain, gapped);
        assert_eq!(plain.cmp(&gapped), Ordering::Equal);
        assert!(gapped < ahead);
        assert!(ahead > plain);
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::new(42).to_string(), "42");
        assert_eq!(
            Position::with_gaps(42, [1, 2]).unwrap().to_string(),
            "42 (gaps: 2)"
        );
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn should_order_by_index_only(a in 0u64..1_000, b in 0u64..1_000, gap in 0u64..1_000) {
                let left = if gap < a {
                    Position::with_gaps(a, [gap]).unwrap()
                } else {
                    Position::new(a)
                };
                let right = Position::new(b);

                prop_assert_eq!(left.cmp(&right), a.cmp(&b));
            }

            #[test]
            fn should_cover_every_index_it_advanced_to(steps in proptest::collection::vec(1u64..5, 1..50)) {
                let mut position = Position::new(0);
                let mut seen = vec![0u64];
                for step in steps {
                    let next = position.index() + step;
                    position = position.advance_to(next, NO_TRIM).unwrap();
                    seen.push(next);
                }

                for index in &seen {
                    prop_assert!(position.covers(*index));
                }
                for gap in position.gaps() {
                    prop_assert!(!seen.contains(&gap));
                    prop_assert!(gap < position.index());
                }
            }
        }
    }
}

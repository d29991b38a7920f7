use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;

use crate::num::PrimInt;
use derive_getters::Dissolve;
use eyre::{eyre, Result};
use impl_tools::autoimpl;
use serde::{Deserialize, Serialize};

/// Interval is a half-open genomic region [start, end).
/// Empty intervals (start == end) and intervals with negative length (start > end) can't be
/// constructed, every interval in the workspace covers at least one nucleotide.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Dissolve, Serialize, Deserialize,
)]
pub struct Interval<Idx: PrimInt> {
    start: Idx,
    end: Idx,
}

/// Trait for types that can be generally viewed as half-open genomic intervals [start, end).
#[autoimpl(for <T: trait + ?Sized> &T, Box<T>, Rc<T>, Arc<T>)]
#[allow(clippy::len_without_is_empty)]
pub trait IntervalOp {
    type Idx: PrimInt;

    /// Start position of the interval-like object.
    fn start(&self) -> Self::Idx;

    /// End position of the interval-like object.
    fn end(&self) -> Self::Idx;

    /// Length of the interval-like object.
    fn len(&self) -> Self::Idx {
        self.end() - self.start()
    }

    /// Check if the interval-like object intersects with another interval-like object.
    /// Touching intervals don't intersect.
    fn intersects(&self, other: &Self) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

impl<T: PrimInt> IntervalOp for Interval<T> {
    type Idx = T;

    #[inline(always)]
    fn start(&self) -> Self::Idx {
        self.start
    }
    #[inline(always)]
    fn end(&self) -> Self::Idx {
        self.end
    }
}

impl<Idx: PrimInt> Interval<Idx> {
    pub fn new(start: Idx, end: Idx) -> Result<Self> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(eyre!(
                "Invalid interval: start ({:?}) must be below end ({:?})",
                start,
                end
            ))
        }
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn intersection_length(&self, other: &Self) -> Idx {
        self.intersection(other)
            .map(|x| x.len())
            .unwrap_or_else(Idx::zero)
    }

    /// Merge overlapping and touching intervals in place. The result is sorted by start position
    /// and contains only disjoint, non-adjacent intervals.
    pub fn merge(intervals: &mut Vec<Self>) {
        if intervals.len() < 2 {
            return;
        }
        intervals.sort_unstable();

        let mut last = 0;
        for ind in 1..intervals.len() {
            let current = intervals[ind];
            if current.start <= intervals[last].end {
                intervals[last].end = intervals[last].end.max(current.end);
            } else {
                last += 1;
                intervals[last] = current;
            }
        }
        intervals.truncate(last + 1);
    }

    /// Gaps between the given intervals inside the `within` bounds. Intervals must be sorted and
    /// disjoint (see [Interval::merge]); parts outside of the bounds are ignored.
    pub fn complement(merged: &[Self], within: Self) -> Vec<Self> {
        let mut result = Vec::with_capacity(merged.len() + 1);
        let mut cursor = within.start;
        for interval in merged {
            if interval.end <= cursor {
                continue;
            }
            if interval.start >= within.end {
                break;
            }
            if interval.start > cursor {
                result.push(Self {
                    start: cursor,
                    end: interval.start,
                });
            }
            cursor = interval.end;
        }
        if cursor < within.end {
            result.push(Self {
                start: cursor,
                end: within.end,
            });
        }
        result
    }
}

impl<Idx: PrimInt> Default for Interval<Idx> {
    fn default() -> Self {
        Self {
            start: Idx::zero(),
            end: Idx::one(),
        }
    }
}

impl<Idx: PrimInt + Display> Display for Interval<Idx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

use std::fmt::Display;

use derive_getters::{Dissolve, Getters};
use eyre::{ensure, Result, WrapErr};
use serde::{Deserialize, Serialize};

use super::interval::{Interval, IntervalOp};

/// A genomic region: a half-open, 0-based interval on a named reference sequence.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Getters, Dissolve, Serialize, Deserialize,
)]
pub struct Region {
    seqid: String,
    interval: Interval<u64>,
}

impl Region {
    pub fn new(seqid: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        let seqid = seqid.into();
        ensure!(!seqid.is_empty(), "Region seqid must not be empty");
        let interval = Interval::new(start, end)
            .wrap_err_with(|| format!("Invalid region {seqid}:{start}-{end}"))?;
        Ok(Self { seqid, interval })
    }

    pub fn from_interval(seqid: impl Into<String>, interval: Interval<u64>) -> Result<Self> {
        let seqid = seqid.into();
        ensure!(!seqid.is_empty(), "Region seqid must not be empty");
        Ok(Self { seqid, interval })
    }

    pub fn start(&self) -> u64 {
        self.interval.start()
    }

    pub fn end(&self) -> u64 {
        self.interval.end()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.interval.len()
    }

    /// Regions overlap only if they are on the same sequence and share at least one nucleotide.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.seqid == other.seqid && self.interval.intersects(&other.interval)
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}",
            self.seqid,
            self.interval.start(),
            self.interval.end()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_new() {
        let region = Region::new("chr1", 10, 20).unwrap();
        assert_eq!(region.seqid(), "chr1");
        assert_eq!(region.len(), 10);
        assert_eq!(region.to_string(), "chr1:10-20");

        assert!(Region::new("chr1", 20, 20).is_err());
        assert!(Region::new("chr1", 20, 10).is_err());
        assert!(Region::new("", 0, 10).is_err());
    }

    #[test]
    fn test_region_order_and_overlap() {
        let a = Region::new("chr1", 10, 20).unwrap();
        let b = Region::new("chr1", 15, 30).unwrap();
        let c = Region::new("chr2", 0, 5).unwrap();

        assert!(a < b && b < c);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&Region::new("chr1", 20, 30).unwrap()));
    }
}

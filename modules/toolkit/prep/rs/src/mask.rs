use ahash::HashMap;
use eyre::{ensure, Result};
use gentile_core_rs::loc::{Interval, IntervalOp, Region};

/// Regions where the signal can't be trusted: excluded regions plus the extra unmappable ones.
#[derive(Debug, Clone, Default)]
pub struct UnmappableMask {
    index: HashMap<String, Vec<Interval<u64>>>,
}

impl UnmappableMask {
    pub fn new(regions: impl IntoIterator<Item = Region>) -> Self {
        let mut index: HashMap<String, Vec<Interval<u64>>> = HashMap::default();
        for region in regions {
            let (seqid, interval) = region.dissolve();
            index.entry(seqid).or_default().push(interval);
        }
        for intervals in index.values_mut() {
            Interval::merge(intervals);
        }
        Self { index }
    }

    /// Flag bins of width `width` tiling `interval` whose unmappable share exceeds `threshold`.
    pub fn flags(
        &self,
        seqid: &str,
        interval: Interval<u64>,
        width: u64,
        threshold: f64,
        into: &mut Vec<bool>,
    ) -> Result<()> {
        ensure!(
            width > 0 && interval.len() % width == 0,
            "Interval {} can't be split into bins of width {}",
            interval,
            width
        );
        let bins = (interval.len() / width) as usize;
        into.clear();
        into.resize(bins, false);

        let Some(intervals) = self.index.get(seqid) else {
            return Ok(());
        };

        let mut covered = vec![0u64; bins];
        let first = intervals.partition_point(|x| x.end() <= interval.start());
        for unmappable in &intervals[first..] {
            if unmappable.start() >= interval.end() {
                break;
            }
            let Some(overlap) = unmappable.intersection(&interval) else {
                continue;
            };

            // Distribute the overlap across the bins it touches
            let (start, end) = (
                overlap.start() - interval.start(),
                overlap.end() - interval.start(),
            );
            for bin in (start / width)..end.div_ceil(width) {
                let (bin_start, bin_end) = (bin * width, (bin + 1) * width);
                covered[bin as usize] += end.min(bin_end) - start.max(bin_start);
            }
        }

        for (flag, covered) in into.iter_mut().zip(covered) {
            *flag = covered as f64 / width as f64 > threshold;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() -> Result<()> {
        let mask = UnmappableMask::new([
            Region::new("chr1", 0, 5)?,
            Region::new("chr1", 12, 20)?,
            Region::new("chr1", 18, 24)?,
        ]);

        let mut flags = Vec::new();
        mask.flags("chr1", Interval::new(0, 40)?, 10, 0.3, &mut flags)?;
        // Unmappable nucleotides per bin: 5, 8, 4, 0
        assert_eq!(flags, vec![true, true, true, false]);

        mask.flags("chr1", Interval::new(0, 40)?, 10, 0.5, &mut flags)?;
        assert_eq!(flags, vec![false, true, false, false]);

        mask.flags("chr2", Interval::new(0, 40)?, 10, 0.0, &mut flags)?;
        assert_eq!(flags, vec![false; 4]);

        assert!(mask
            .flags("chr1", Interval::new(0, 35)?, 10, 0.3, &mut flags)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_threshold_is_exclusive() -> Result<()> {
        let mask = UnmappableMask::new([Region::new("chr1", 100, 103)?]);
        let mut flags = Vec::new();
        mask.flags("chr1", Interval::new(100, 110)?, 10, 0.3, &mut flags)?;
        assert_eq!(flags, vec![false]);
        Ok(())
    }
}

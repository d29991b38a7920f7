//! bedGraph coverage tracks: `seqid start end value` lines with the usual BED headers.

use crate::bed::{parse, BedRecord, Reader};
use crate::ReadRecord;
use ahash::HashMap;
use derive_getters::{Dissolve, Getters};
use eyre::{ensure, Result, WrapErr};
use gentile_core_rs::loc::{Interval, IntervalOp};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Dissolve, Getters)]
pub struct BedGraph {
    seqid: String,
    interval: Interval<u64>,
    value: f32,
}

impl BedGraph {
    pub fn new(seqid: String, interval: Interval<u64>, value: f32) -> Result<Self> {
        ensure!(!seqid.is_empty(), "bedGraph seqid must not be empty");
        Ok(Self {
            seqid,
            interval,
            value,
        })
    }
}

impl BedRecord for BedGraph {
    fn parse<'a>(parts: &mut impl Iterator<Item = &'a str>, into: &mut Self) -> Result<()> {
        into.seqid = parse::seqid(parts)?;
        into.interval = parse::interval(parts)?;
        into.value = parse::value(parts)?;
        Ok(())
    }

    fn write(&self, writer: &mut impl Write) -> Result<()> {
        write!(
            writer,
            "{}\t{}\t{}\t{}",
            self.seqid,
            self.interval.start(),
            self.interval.end(),
            self.value
        )?;
        Ok(())
    }
}

/// Per-nucleotide signal of a single track, indexed by reference sequence.
///
/// Records of each sequence are kept sorted by start; records must not overlap.
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    index: HashMap<String, (Vec<Interval<u64>>, Vec<f32>)>,
}

impl Coverage {
    pub fn from_records(records: impl IntoIterator<Item = BedGraph>) -> Result<Self> {
        let mut grouped: HashMap<String, Vec<(Interval<u64>, f32)>> = HashMap::default();
        for record in records {
            let (seqid, interval, value) = record.dissolve();
            grouped.entry(seqid).or_default().push((interval, value));
        }

        let mut index = HashMap::default();
        for (seqid, mut records) in grouped {
            records.sort_by_key(|(interval, _)| *interval);
            for window in records.windows(2) {
                let (previous, next) = (&window[0].0, &window[1].0);
                ensure!(
                    previous.end() <= next.start(),
                    "Overlapping bedGraph records: {seqid}:{previous} and {seqid}:{next}"
                );
            }
            let (intervals, values) = records.into_iter().unzip();
            index.insert(seqid, (intervals, values));
        }
        Ok(Self { index })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut records = Vec::new();
        Reader::<_, BedGraph>::from_path(path)?
            .read_to_end(&mut records)
            .wrap_err_with(|| format!("Failed to read bedGraph {}", path.display()))?;
        Self::from_records(records)
            .wrap_err_with(|| format!("Invalid bedGraph {}", path.display()))
    }

    /// Write the signal of the given region into `into`, one value per nucleotide.
    /// Positions without records are 0 as are NaN values.
    pub fn fill(&self, seqid: &str, interval: Interval<u64>, into: &mut [f32]) -> Result<()> {
        ensure!(
            into.len() as u64 == interval.len(),
            "Coverage buffer of length {} doesn't match the interval {}",
            into.len(),
            interval
        );
        into.fill(0.0);

        let Some((intervals, values)) = self.index.get(seqid) else {
            return Ok(());
        };

        // Records are sorted and disjoint, hence their ends are sorted as well
        let first = intervals.partition_point(|x| x.end() <= interval.start());
        for (record, value) in intervals[first..].iter().zip(&values[first..]) {
            if record.start() >= interval.end() {
                break;
            }
            if value.is_nan() {
                continue;
            }
            if let Some(overlap) = record.intersection(&interval) {
                let start = (overlap.start() - interval.start()) as usize;
                let end = (overlap.end() - interval.start()) as usize;
                into[start..end].fill(*value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seqid: &str, start: u64, end: u64, value: f32) -> BedGraph {
        BedGraph::new(seqid.to_owned(), Interval::new(start, end).unwrap(), value).unwrap()
    }

    #[test]
    fn test_fill() -> Result<()> {
        let coverage = Coverage::from_records([
            record("chr1", 5, 8, 2.0),
            record("chr1", 0, 2, 1.0),
            record("chr1", 8, 9, f32::NAN),
            record("chr2", 0, 10, 7.0),
        ])?;

        let mut buffer = vec![-1.0; 10];
        coverage.fill("chr1", Interval::new(0, 10)?, &mut buffer)?;
        assert_eq!(
            buffer,
            vec![1.0, 1.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0, 0.0, 0.0]
        );

        let mut buffer = vec![-1.0; 3];
        coverage.fill("chr1", Interval::new(6, 9)?, &mut buffer)?;
        assert_eq!(buffer, vec![2.0, 2.0, 0.0]);

        coverage.fill("chrM", Interval::new(6, 9)?, &mut buffer)?;
        assert_eq!(buffer, vec![0.0; 3]);

        assert!(coverage
            .fill("chr2", Interval::new(0, 5)?, &mut buffer)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_overlapping_records() {
        let result = Coverage::from_records([record("chr1", 0, 5, 1.0), record("chr1", 4, 6, 1.0)]);
        assert!(result.is_err());

        let result = Coverage::from_records([record("chr1", 0, 5, 1.0), record("chr1", 5, 6, 1.0)]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_from_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("track.bedgraph");
        std::fs::write(
            &path,
            "track type=bedGraph\nchr1\t0\t4\t1.5\nchr1\t4\t8\t-2\n",
        )?;

        let coverage = Coverage::from_path(&path)?;
        let mut buffer = vec![0.0; 8];
        coverage.fill("chr1", Interval::new(0, 8)?, &mut buffer)?;
        assert_eq!(buffer, vec![1.5, 1.5, 1.5, 1.5, -2.0, -2.0, -2.0, -2.0]);
        Ok(())
    }
}

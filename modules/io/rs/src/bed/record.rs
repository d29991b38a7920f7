use super::parse;
use derive_getters::{Dissolve, Getters};
use eyre::{ensure, Result};
use gentile_core_rs::loc::{Interval, IntervalOp, Region};
use std::io::Write;

/// A record with a fixed number of leading BED fields.
pub trait BedRecord: Sized {
    /// Parse the record fields from the tab-separated parts of a line into the given buffer.
    fn parse<'a>(parts: &mut impl Iterator<Item = &'a str>, into: &mut Self) -> Result<()>;

    /// Write the record as a single tab-separated line without the line terminator.
    fn write(&self, writer: &mut impl Write) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Dissolve, Getters)]
pub struct Bed3 {
    seqid: String,
    interval: Interval<u64>,
}

impl Bed3 {
    pub fn new(seqid: String, interval: Interval<u64>) -> Result<Self> {
        ensure!(!seqid.is_empty(), "BED seqid must not be empty");
        Ok(Self { seqid, interval })
    }
}

impl From<Region> for Bed3 {
    fn from(region: Region) -> Self {
        let (seqid, interval) = region.dissolve();
        Self { seqid, interval }
    }
}

impl TryFrom<Bed3> for Region {
    type Error = eyre::Report;

    fn try_from(bed: Bed3) -> Result<Self> {
        Region::from_interval(bed.seqid, bed.interval)
    }
}

impl BedRecord for Bed3 {
    fn parse<'a>(parts: &mut impl Iterator<Item = &'a str>, into: &mut Self) -> Result<()> {
        into.seqid = parse::seqid(parts)?;
        into.interval = parse::interval(parts)?;
        Ok(())
    }

    fn write(&self, writer: &mut impl Write) -> Result<()> {
        write!(
            writer,
            "{}\t{}\t{}",
            self.seqid,
            self.interval.start(),
            self.interval.end()
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Dissolve, Getters)]
pub struct Bed4 {
    seqid: String,
    interval: Interval<u64>,
    name: String,
}

impl Bed4 {
    pub fn new(seqid: String, interval: Interval<u64>, name: String) -> Result<Self> {
        ensure!(!seqid.is_empty(), "BED seqid must not be empty");
        ensure!(
            !name.is_empty() && name.bytes().all(|x| (0x20..=0x7e).contains(&x)),
            "BED name must be a non-empty printable ASCII string: {name:?}"
        );
        Ok(Self {
            seqid,
            interval,
            name,
        })
    }
}

impl From<Bed4> for Bed3 {
    fn from(bed: Bed4) -> Self {
        Self {
            seqid: bed.seqid,
            interval: bed.interval,
        }
    }
}

impl BedRecord for Bed4 {
    fn parse<'a>(parts: &mut impl Iterator<Item = &'a str>, into: &mut Self) -> Result<()> {
        into.seqid = parse::seqid(parts)?;
        into.interval = parse::interval(parts)?;
        into.name = parse::name(parts)?;
        Ok(())
    }

    fn write(&self, writer: &mut impl Write) -> Result<()> {
        write!(
            writer,
            "{}\t{}\t{}\t{}",
            self.seqid,
            self.interval.start(),
            self.interval.end(),
            self.name
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bed4_validation() {
        let interval = Interval::new(0, 10).unwrap();
        assert!(Bed4::new("chr1".into(), interval, "train".into()).is_ok());
        assert!(Bed4::new("chr1".into(), interval, "".into()).is_err());
        assert!(Bed4::new("chr1".into(), interval, "tab\there".into()).is_err());
        assert!(Bed3::new("".into(), interval).is_err());
    }

    #[test]
    fn test_region_conversion() -> Result<()> {
        let region = Region::new("chrX", 5, 15)?;
        let bed = Bed3::from(region.clone());
        assert_eq!(bed.seqid(), "chrX");
        assert_eq!(Region::try_from(bed)?, region);
        Ok(())
    }
}

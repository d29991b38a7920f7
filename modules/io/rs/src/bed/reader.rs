use super::record::BedRecord;
use crate::compression::decode;
use crate::ReadRecord;
use eyre::{bail, ensure, OptionExt, Result, WrapErr};
use gentile_core_rs::loc::Interval;
use std::io::BufRead;
use std::marker::PhantomData;
use std::path::Path;

pub mod parse {
    use super::*;

    pub fn seqid<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<String> {
        let seqid = parts.next().ok_or_eyre("Missing BED seqid")?;
        ensure!(!seqid.is_empty(), "Empty BED seqid");
        Ok(seqid.to_owned())
    }

    pub fn interval<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Interval<u64>> {
        let start = parts.next().ok_or_eyre("Missing BED start")?;
        let end = parts.next().ok_or_eyre("Missing BED end")?;

        let (start, end) = match (start.parse::<u64>(), end.parse::<u64>()) {
            (Ok(start), Ok(end)) => (start, end),
            _ => bail!("Invalid BED interval"),
        };
        let interval = Interval::new(start, end).wrap_err("Invalid BED interval")?;
        Ok(interval)
    }

    pub fn name<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<String> {
        let name = parts.next().ok_or_eyre("Missing BED name")?;
        Ok(name.to_owned())
    }

    pub fn value<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<f32> {
        let value = parts.next().ok_or_eyre("Missing bedGraph value")?;
        let value = value.trim().parse::<f32>().wrap_err("Invalid bedGraph value")?;
        Ok(value)
    }
}

fn is_header(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}

/// Line-oriented reader of BED-like records.
///
/// By default, columns after the ones interpreted by the record type are ignored (BED3+ style).
/// Use [Reader::strict] to reject them instead.
pub struct Reader<R, Bed> {
    reader: R,
    buffer: String,
    line: u64,
    strict: bool,
    _phantom: PhantomData<Bed>,
}

impl<R: BufRead, Bed> Reader<R, Bed> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
            line: 0,
            strict: false,
            _phantom: PhantomData,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl<Bed: BedRecord> Reader<Box<dyn BufRead + Send + 'static>, Bed> {
    /// Create a new reader for the given file path.
    /// The compression is detected based on the internal file signature.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let stream = decode::open(path)?;
        Ok(Self::new(stream))
    }
}

impl<R: BufRead, Bed: BedRecord> ReadRecord for Reader<R, Bed> {
    type Record = Bed;

    fn read_record(&mut self, into: &mut Bed) -> Result<bool> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(false);
            }
            self.line += 1;

            let line = self.buffer.trim_end_matches(['\n', '\r']);
            if is_header(line) {
                continue;
            }

            let mut parts = line.split('\t');
            Bed::parse(&mut parts, into)
                .wrap_err_with(|| format!("Failed to parse BED line {}: {}", self.line, line))?;
            ensure!(
                !self.strict || parts.next().is_none(),
                "BED line {} has too many fields: {}",
                self.line,
                line
            );
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bed::{Bed3, Bed4};
    use std::io::Cursor;

    #[test]
    fn test_skips_headers_and_extra_columns() -> Result<()> {
        let content = "\
track name=gaps
# comment
browser position chr1

chr1\t10\t20\textra\t0
chr2\t0\t5\r
";
        let mut reader = Reader::<_, Bed3>::new(Cursor::new(content));
        let mut records = Vec::new();
        assert_eq!(reader.read_to_end(&mut records)?, 2);

        assert_eq!(records[0], Bed3::new("chr1".into(), Interval::new(10, 20)?)?);
        assert_eq!(records[1], Bed3::new("chr2".into(), Interval::new(0, 5)?)?);
        Ok(())
    }

    #[test]
    fn test_strict_reader() -> Result<()> {
        let mut reader = Reader::<_, Bed3>::new(Cursor::new("chr1\t10\t20\tname\n")).strict(true);
        let mut record = Bed3::default();
        assert!(reader.read_record(&mut record).is_err());

        let mut reader = Reader::<_, Bed4>::new(Cursor::new("chr1\t10\t20\tname\n")).strict(true);
        let mut record = Bed4::default();
        assert!(reader.read_record(&mut record)?);
        assert_eq!(record.name(), "name");
        assert!(!reader.read_record(&mut record)?);
        Ok(())
    }

    #[test]
    fn test_invalid_records() {
        for content in ["chr1\t20\t10\n", "chr1\t10\n", "chr1\tX\t10\n", "\t0\t10\n"] {
            let mut reader = Reader::<_, Bed3>::new(Cursor::new(content));
            let mut record = Bed3::default();
            assert!(reader.read_record(&mut record).is_err(), "{content:?}");
        }
    }

    #[test]
    fn test_read_to_end_reuses_buffer() -> Result<()> {
        let mut records = vec![Bed3::default(); 5];
        let mut reader = Reader::<_, Bed3>::new(Cursor::new("chr1\t0\t1\nchr1\t1\t2\n"));
        assert_eq!(reader.read_to_end(&mut records)?, 2);
        assert_eq!(records.len(), 2);
        Ok(())
    }
}

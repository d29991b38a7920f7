use super::record::BedRecord;
use crate::compression::encode;
use crate::WriteRecord;
use eyre::{Result, WrapErr};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

pub struct Writer<W, Bed> {
    writer: W,
    _phantom: PhantomData<Bed>,
}

impl<W: Write, Bed> Writer<W, Bed> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _phantom: PhantomData,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<Bed: BedRecord> Writer<encode::Stream<BufWriter<File>>, Bed> {
    /// Create a BED file at the given path. The compression is inferred from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create BED file {}", path.display()))?;
        let stream = encode::Stream::new(
            BufWriter::new(file),
            &encode::Config::infer_from_path(path),
        );
        Ok(Self::new(stream))
    }

    /// Finish the compressed stream and flush everything to disk.
    pub fn finish(self) -> Result<()> {
        self.writer.finish()?;
        Ok(())
    }
}

impl<W: Write, Bed: BedRecord> WriteRecord for Writer<W, Bed> {
    type Record = Bed;

    fn write_record(&mut self, record: &Bed) -> Result<()> {
        record.write(&mut self.writer)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

//! Training record shards: a gzip stream of `u32` little-endian length-prefixed records encoded
//! with `bitcode`.

use crate::compression::{decode, encode};
use crate::{ReadRecord, WriteRecord};
use bitcode::{Decode, Encode};
use derive_getters::{Dissolve, Getters};
use eyre::{bail, ensure, Result, WrapErr};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// Largest nucleotide code, used for anything that is not A, C, G or T.
pub const MAX_NUCLEOTIDE_CODE: u8 = 4;

/// A single fixed-length window packaged for training.
#[derive(Debug, Clone, PartialEq, Default, Encode, Decode, Dissolve, Getters)]
pub struct Record {
    seqid: String,
    start: u64,
    end: u64,
    split: String,
    // One code per nucleotide, see MAX_NUCLEOTIDE_CODE
    sequence: Vec<u8>,
    // [num_bins × num_targets], bin-major
    targets: Vec<f32>,
    num_targets: u32,
    // One flag per bin
    mask: Vec<bool>,
}

impl Record {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seqid: String,
        start: u64,
        end: u64,
        split: String,
        sequence: Vec<u8>,
        targets: Vec<f32>,
        num_targets: u32,
        mask: Vec<bool>,
    ) -> Result<Self> {
        ensure!(
            start < end,
            "Invalid record interval {seqid}:{start}-{end}"
        );
        ensure!(
            sequence.len() as u64 == end - start,
            "Record {seqid}:{start}-{end} has {} nucleotides",
            sequence.len()
        );
        ensure!(
            sequence.iter().all(|x| *x <= MAX_NUCLEOTIDE_CODE),
            "Record {seqid}:{start}-{end} contains invalid nucleotide codes"
        );
        ensure!(num_targets > 0, "Record must have at least one target");
        ensure!(
            targets.len() % num_targets as usize == 0
                && mask.len() == targets.len() / num_targets as usize,
            "Record {seqid}:{start}-{end}: {} target values and {} mask flags don't match {} targets",
            targets.len(),
            mask.len(),
            num_targets
        );
        Ok(Self {
            seqid,
            start,
            end,
            split,
            sequence,
            targets,
            num_targets,
            mask,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.mask.len()
    }
}

pub struct ShardWriter<W: Write> {
    stream: encode::Stream<W>,
    buffer: bitcode::Buffer,
}

impl<W: Write> ShardWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            stream: encode::Stream::new(writer, &encode::Config::Gzip(encode::Level::DEFAULT)),
            buffer: bitcode::Buffer::new(),
        }
    }

    /// Finalize the gzip stream and return the inner writer.
    pub fn finish(self) -> Result<W> {
        self.stream.finish()
    }
}

impl ShardWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create shard {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> WriteRecord for ShardWriter<W> {
    type Record = Record;

    fn write_record(&mut self, record: &Record) -> Result<()> {
        let bytes = self.buffer.encode(record);
        let length = u32::try_from(bytes.len()).wrap_err("Record is too large")?;
        self.stream.write_all(&length.to_le_bytes())?;
        self.stream.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}

pub struct ShardReader<R: Read> {
    stream: decode::Stream<R>,
    buffer: Vec<u8>,
}

impl<R: Read> ShardReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            stream: decode::Stream::new(reader, &decode::Config::Gzip),
            buffer: Vec::new(),
        }
    }

    // None on a clean end of stream, i.e. before the first byte of the length prefix
    fn read_length(&mut self) -> Result<Option<u32>> {
        let mut length = [0u8; 4];
        let mut filled = 0;
        while filled < length.len() {
            match self.stream.read(&mut length[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => bail!("Truncated record shard"),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(u32::from_le_bytes(length)))
    }
}

impl ShardReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .wrap_err_with(|| format!("Failed to open shard {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> ReadRecord for ShardReader<R> {
    type Record = Record;

    fn read_record(&mut self, into: &mut Record) -> Result<bool> {
        let Some(length) = self.read_length()? else {
            return Ok(false);
        };

        self.buffer.resize(length as usize, 0);
        self.stream
            .read_exact(&mut self.buffer)
            .wrap_err("Truncated record shard")?;
        *into = bitcode::decode(&self.buffer).wrap_err("Malformed record")?;
        Ok(true)
    }
}

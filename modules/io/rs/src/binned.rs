//! Binned coverage matrix of a single track: `num_windows × num_bins` little-endian `f32` values
//! stored row-wise after a fixed header.
//!
//! Header layout: magic `GTCV`, `u32` format version, `u64` number of windows, `u64` number of
//! bins per window.

use derive_getters::Getters;
use eyre::{ensure, Result, WrapErr};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

const MAGIC: &[u8; 4] = b"GTCV";
const VERSION: u32 = 1;
const HEADER_SIZE: u64 = 4 + 4 + 8 + 8;

#[derive(Getters)]
pub struct BinnedWriter<W: Write> {
    #[getter(skip)]
    writer: W,
    num_windows: u64,
    num_bins: u64,
    written: u64,
    #[getter(skip)]
    buffer: Vec<u8>,
}

impl<W: Write> BinnedWriter<W> {
    pub fn new(mut writer: W, num_windows: u64, num_bins: u64) -> Result<Self> {
        ensure!(num_bins > 0, "Number of bins must be positive");
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&num_windows.to_le_bytes())?;
        writer.write_all(&num_bins.to_le_bytes())?;
        Ok(Self {
            writer,
            num_windows,
            num_bins,
            written: 0,
            buffer: Vec::with_capacity(num_bins as usize * 4),
        })
    }

    /// Append the bins of the next window.
    pub fn write_row(&mut self, row: &[f32]) -> Result<()> {
        ensure!(
            row.len() as u64 == self.num_bins,
            "Expected {} bins per window, got {}",
            self.num_bins,
            row.len()
        );
        ensure!(
            self.written < self.num_windows,
            "All {} windows were already written",
            self.num_windows
        );

        self.buffer.clear();
        for value in row {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
        self.writer.write_all(&self.buffer)?;
        self.written += 1;
        Ok(())
    }

    /// Ensure that every window was written and flush the output.
    pub fn finish(mut self) -> Result<W> {
        ensure!(
            self.written == self.num_windows,
            "Binned matrix is incomplete: {} out of {} windows written",
            self.written,
            self.num_windows
        );
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl BinnedWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, num_windows: u64, num_bins: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        Self::new(BufWriter::new(file), num_windows, num_bins)
    }
}

#[derive(Getters)]
pub struct BinnedReader<R: Read + Seek> {
    #[getter(skip)]
    reader: R,
    num_windows: u64,
    num_bins: u64,
    #[getter(skip)]
    buffer: Vec<u8>,
}

impl<R: Read + Seek> BinnedReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_SIZE as usize];
        reader
            .read_exact(&mut header)
            .wrap_err("Truncated binned matrix header")?;

        ensure!(&header[..4] == MAGIC, "Not a binned coverage matrix");
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        ensure!(
            version == VERSION,
            "Unsupported binned matrix version: {version}"
        );

        let mut word = [0u8; 8];
        word.copy_from_slice(&header[8..16]);
        let num_windows = u64::from_le_bytes(word);
        word.copy_from_slice(&header[16..24]);
        let num_bins = u64::from_le_bytes(word);
        ensure!(num_bins > 0, "Binned matrix has no bins");

        Ok(Self {
            reader,
            num_windows,
            num_bins,
            buffer: Vec::new(),
        })
    }

    /// Read the bins of consecutive windows into `into` (row-major). The vector is cleared first.
    pub fn read_rows(&mut self, windows: Range<u64>, into: &mut Vec<f32>) -> Result<()> {
        ensure!(
            windows.start <= windows.end && windows.end <= self.num_windows,
            "Windows {:?} are out of bounds for a matrix with {} windows",
            windows,
            self.num_windows
        );

        let values = ((windows.end - windows.start) * self.num_bins) as usize;
        let offset = HEADER_SIZE + windows.start * self.num_bins * 4;
        self.reader.seek(SeekFrom::Start(offset))?;

        self.buffer.resize(values * 4, 0);
        self.reader
            .read_exact(&mut self.buffer)
            .wrap_err("Truncated binned matrix")?;

        into.clear();
        into.extend(
            self.buffer
                .chunks_exact(4)
                .map(|x| f32::from_le_bytes([x[0], x[1], x[2], x[3]])),
        );
        Ok(())
    }
}

impl BinnedReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
        Self::new(BufReader::new(file)).wrap_err_with(|| format!("Invalid {}", path.display()))
    }
}

use super::index::{FaEntry, FaIndex};
use crate::compression::decode;
use eyre::{ensure, eyre, Result, WrapErr};
use gentile_core_rs::loc::{Interval, IntervalOp};
use impl_tools::autoimpl;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// An indexed FASTA reader that can fetch sequences by reference sequence ID and interval.
#[autoimpl(for<T: trait + ?Sized> &mut T, Box<T>)]
pub trait IndexedReaderMutOp {
    /// The index of the underlying FASTA file.
    fn index(&self) -> &FaIndex;

    /// Fetch the sequence for the given reference sequence ID and interval. The buffer is cleared
    /// before fetching.
    fn fetch(&mut self, seqid: &str, interval: Interval<u64>, buffer: &mut Vec<u8>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct IndexedReader<R> {
    reader: R,
    index: FaIndex,
}

impl IndexedReader<()> {
    /// Open an indexed FASTA file. Plain files use `{fasta}.fai` (or scan the file when it is
    /// missing); BGZF files additionally require `{fasta}.gzi`.
    pub fn from_path(
        fasta: impl AsRef<Path>,
    ) -> Result<Box<dyn IndexedReaderMutOp + Send + Sync + 'static>> {
        let index = FaIndex::load(fasta.as_ref())?;
        Self::with_index(fasta, index)
    }

    /// Open the FASTA file with an already loaded index.
    pub fn with_index(
        fasta: impl AsRef<Path>,
        index: FaIndex,
    ) -> Result<Box<dyn IndexedReaderMutOp + Send + Sync + 'static>> {
        let path = fasta.as_ref();
        let compression = decode::Config::infer_from_path(path)?;
        let file = File::open(path)
            .wrap_err_with(|| format!("Failed to open FASTA {}", path.display()))?;

        let boxed: Box<dyn IndexedReaderMutOp + Send + Sync + 'static> = match compression {
            decode::Config::Plain => Box::new(IndexedReader::new(file, index)),
            decode::Config::Bgzf => {
                let mut gzi = path.as_os_str().to_owned();
                gzi.push(".gzi");
                let gzi = std::path::PathBuf::from(gzi);
                ensure!(gzi.exists(), "gzi index does not exist: {}", gzi.display());
                let gzi = noodles::bgzf::gzi::fs::read(&gzi)?;

                let reader = noodles::bgzf::io::indexed_reader::IndexedReader::new(file, gzi);
                Box::new(IndexedReader::new(reader, index))
            }
            decode::Config::Gzip => {
                return Err(eyre!(
                    "Random access to gzip-compressed FASTA is not supported, use bgzip: {}",
                    path.display()
                ));
            }
        };

        Ok(boxed)
    }
}

impl<R: Read + Seek> IndexedReader<R> {
    pub fn new(reader: R, index: FaIndex) -> Self {
        Self { reader, index }
    }

    fn sanitize(&self, seqid: &str, interval: &Interval<u64>) -> Result<&FaEntry> {
        let entry = self
            .index
            .get(seqid)
            .ok_or_else(|| eyre!("Reference sequence ID not found in the index: {}", seqid))?;

        let length = *entry.length();
        ensure!(
            interval.end() <= length,
            "Interval {} for {} is out of bounds, sequence length is {}",
            interval,
            seqid,
            length
        );
        Ok(entry)
    }

    #[inline(always)]
    fn _fetch(
        reader: &mut R,
        entry: &FaEntry,
        start: u64,
        end: u64,
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        let (offset, bases_per_line, bytes_per_line) =
            (*entry.offset(), *entry.line_bases(), *entry.line_width());
        let endline_bytes = bytes_per_line - bases_per_line;

        // Calculate start and end lines in the FASTA file
        let start_line = start / bases_per_line;
        let end_line = end / bases_per_line;

        buffer.clear();
        let length = (end - start) as usize;
        buffer.try_reserve(length)?;

        // Seek to the start of the sequence
        let start_byte = offset + start_line * bytes_per_line + start % bases_per_line;
        reader.seek(std::io::SeekFrom::Start(start_byte))?;

        // The sequence is contained in a single line
        if start_line == end_line {
            reader.by_ref().take(length as u64).read_to_end(buffer)?;
        } else {
            let mut sink = std::io::sink();

            // First line, might be incomplete
            let to_read = bases_per_line * (start_line + 1) - start;
            reader.by_ref().take(to_read).read_to_end(buffer)?;
            std::io::copy(&mut reader.by_ref().take(endline_bytes), &mut sink)?;

            for _ in start_line + 1..end_line {
                reader.by_ref().take(bases_per_line).read_to_end(buffer)?;
                std::io::copy(&mut reader.by_ref().take(endline_bytes), &mut sink)?;
            }

            // Last line, might be incomplete
            reader
                .by_ref()
                .take(end - end_line * bases_per_line)
                .read_to_end(buffer)?;
        }

        ensure!(
            buffer.len() == length,
            "Truncated FASTA file: expected {} bases for {}:{}-{}, got {}",
            length,
            entry.name(),
            start,
            end,
            buffer.len()
        );
        Ok(())
    }
}

impl<R: Read + Seek> IndexedReaderMutOp for IndexedReader<R> {
    fn index(&self) -> &FaIndex {
        &self.index
    }

    fn fetch(&mut self, seqid: &str, interval: Interval<u64>, buffer: &mut Vec<u8>) -> Result<()> {
        let entry = self.sanitize(seqid, &interval)?.clone();
        Self::_fetch(
            &mut self.reader,
            &entry,
            interval.start(),
            interval.end(),
            buffer,
        )
        .wrap_err_with(|| format!("Failed to fetch {seqid}:{interval}"))
    }
}

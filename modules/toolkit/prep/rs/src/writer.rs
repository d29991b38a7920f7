use std::cell::RefCell;
use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use thread_local::ThreadLocal;

use gentile_io_rs::binned::BinnedReader;
use gentile_io_rs::fasta::{FaIndex, IndexedReader, IndexedReaderMutOp};
use gentile_io_rs::records::{Record, ShardWriter};
use gentile_io_rs::WriteRecord;

use crate::binner::Binning;
use crate::dna;
use crate::engine::{self, Job};
use crate::error::PrepError;
use crate::manifest::{LabeledWindow, Manifest};
use crate::mask::UnmappableMask;
use crate::split::Split;

struct Readers {
    fasta: Box<dyn IndexedReaderMutOp + Send + Sync>,
    coverage: Vec<BinnedReader<BufReader<File>>>,
}

/// Inputs shared by all shard jobs. Readers are opened lazily, once per worker thread.
pub struct Sources<'a> {
    fasta: &'a Path,
    index: &'a FaIndex,
    coverage: Vec<PathBuf>,
    // Rows expected in every binned matrix
    num_windows: usize,
    mask: &'a UnmappableMask,
    binning: Binning,
    umap_t: f64,
    readers: ThreadLocal<RefCell<Readers>>,
}

impl<'a> Sources<'a> {
    /// `coverage` holds binned matrices in the order of targets inside records, each one with
    /// a row per manifest window.
    pub fn new(
        fasta: &'a Path,
        index: &'a FaIndex,
        coverage: Vec<PathBuf>,
        num_windows: usize,
        mask: &'a UnmappableMask,
        binning: Binning,
        umap_t: f64,
    ) -> Result<Self> {
        ensure!(
            !coverage.is_empty(),
            "At least one coverage track is required"
        );
        Ok(Self {
            fasta,
            index,
            coverage,
            num_windows,
            mask,
            binning,
            umap_t,
            readers: ThreadLocal::new(),
        })
    }

    fn open(&self) -> Result<Readers> {
        let fasta = IndexedReader::with_index(self.fasta, self.index.clone())?;
        let mut coverage = Vec::with_capacity(self.coverage.len());
        for path in &self.coverage {
            let reader = BinnedReader::open(path)?;
            // Matrices left by an earlier run may describe a different manifest
            ensure!(
                *reader.num_windows() == self.num_windows as u64
                    && *reader.num_bins() == self.binning.num_bins(),
                "Binned matrix {} has {}x{} values, expected {}x{}",
                path.display(),
                reader.num_windows(),
                reader.num_bins(),
                self.num_windows,
                self.binning.num_bins()
            );
            coverage.push(reader);
        }
        Ok(Readers { fasta, coverage })
    }
}

/// Writes a consecutive range of a split's windows into a single shard.
pub struct ShardJob<'a> {
    split: Split,
    // Range inside the split
    range: Range<usize>,
    // Position of the split inside the manifest
    offset: usize,
    windows: &'a [LabeledWindow],
    sources: &'a Sources<'a>,
    output: PathBuf,
}

impl<'a> ShardJob<'a> {
    /// Cut every split of the manifest into shards of at most `records` windows.
    pub fn partition(
        manifest: &'a Manifest,
        sources: &'a Sources<'a>,
        records: usize,
        out: &Path,
    ) -> Result<Vec<Self>> {
        ensure!(records > 0, "Shards must hold at least one record");

        let mut jobs = Vec::new();
        for split in Split::ALL {
            let windows = manifest.split(split);
            let offset = manifest.range(split).start;
            for (shard, start) in (0..windows.len()).step_by(records).enumerate() {
                let end = (start + records).min(windows.len());
                jobs.push(Self {
                    split,
                    range: start..end,
                    offset,
                    windows: &windows[start..end],
                    sources,
                    output: Self::output_path(out, split, shard),
                });
            }
        }
        Ok(jobs)
    }

    pub fn output_path(out: &Path, split: Split, shard: usize) -> PathBuf {
        out.join("records")
            .join(split.as_str())
            .join(format!("{split}-{shard}.rec"))
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    fn write(&self) -> Result<()> {
        let sources = self.sources;
        let mut readers = sources
            .readers
            .get_or_try(|| sources.open().map(RefCell::new))?
            .borrow_mut();

        // Binned coverage of all windows in the shard, one matrix per track
        let rows = (self.offset + self.range.start) as u64..(self.offset + self.range.end) as u64;
        let mut coverage = vec![Vec::new(); readers.coverage.len()];
        for (reader, into) in readers.coverage.iter_mut().zip(coverage.iter_mut()) {
            reader.read_rows(rows.clone(), into)?;
        }

        let staging = engine::staging(&self.output);
        let mut writer = ShardWriter::create(&staging)?;

        let num_bins = sources.binning.num_bins() as usize;
        let num_targets = coverage.len();
        let mut sequence = Vec::new();
        for (ind, labeled) in self.windows.iter().enumerate() {
            let region = labeled.window().region();
            readers
                .fasta
                .fetch(region.seqid(), *region.interval(), &mut sequence)?;

            let mut codes = Vec::with_capacity(sequence.len());
            dna::encode_into(&sequence, &mut codes);

            let mut targets = vec![0.0; num_bins * num_targets];
            for (track, matrix) in coverage.iter().enumerate() {
                let row = &matrix[ind * num_bins..(ind + 1) * num_bins];
                for (bin, value) in row.iter().enumerate() {
                    targets[bin * num_targets + track] = *value;
                }
            }

            let mut mask = Vec::with_capacity(num_bins);
            sources.mask.flags(
                region.seqid(),
                sources.binning.cropped(region.interval())?,
                sources.binning.width(),
                sources.umap_t,
                &mut mask,
            )?;

            let record = Record::new(
                region.seqid().clone(),
                region.start(),
                region.end(),
                self.split.to_string(),
                codes,
                targets,
                num_targets as u32,
                mask,
            )?;
            writer.write_record(&record)?;
        }

        writer
            .finish()
            .wrap_err_with(|| format!("Failed to write {}", staging.display()))?;
        engine::commit(&self.output)
    }
}

impl Job for ShardJob<'_> {
    fn name(&self) -> String {
        format!(
            "{} shard [{}, {})",
            self.split, self.range.start, self.range.end
        )
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output.clone()]
    }

    fn run(&self) -> Result<()> {
        self.write().map_err(|source| {
            PrepError::ShardWrite {
                split: self.split,
                start: self.range.start,
                end: self.range.end,
                source: source.into(),
            }
            .into()
        })
    }
}

use crate::engine::{self, Job};
use crate::error::PrepError;
use crate::manifest::LabeledWindow;
use eyre::{ensure, Result, WrapErr};
use gentile_core_rs::loc::{Interval, IntervalOp};
use gentile_io_rs::bedgraph::Coverage;
use gentile_io_rs::binned::BinnedWriter;
use gentile_io_rs::tracks::Track;
use std::path::{Path, PathBuf};

/// Geometry of the bins inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binning {
    crop: u64,
    width: u64,
    num_bins: u64,
}

impl Binning {
    pub fn new(length: u64, crop: u64, width: u64) -> Result<Self> {
        ensure!(width > 0, "Bin width must be positive");
        ensure!(
            2 * crop < length && (length - 2 * crop) % width == 0,
            "Window of {length} nt cropped by {crop} nt can't be split into bins of {width} nt"
        );
        Ok(Self {
            crop,
            width,
            num_bins: (length - 2 * crop) / width,
        })
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn num_bins(&self) -> u64 {
        self.num_bins
    }

    /// Part of the window that is split into bins.
    pub fn cropped(&self, window: &Interval<u64>) -> Result<Interval<u64>> {
        Interval::new(window.start() + self.crop, window.end() - self.crop)
    }

    /// Clip per-nucleotide values and aggregate them into bins.
    pub fn aggregate(&self, track: &Track, signal: &mut [f32], into: &mut [f32]) {
        debug_assert_eq!(signal.len() as u64, self.num_bins * self.width);
        debug_assert_eq!(into.len() as u64, self.num_bins);

        for (bin, value) in signal.chunks_mut(self.width as usize).zip(into.iter_mut()) {
            for x in bin.iter_mut() {
                *x = track.clip_value(*x);
            }
            *value = track.finalize(track.sum_stat().aggregate(bin));
        }
    }
}

/// Bins a single track over every window of the manifest.
pub struct BinnerJob<'a> {
    track: &'a Track,
    windows: &'a [LabeledWindow],
    binning: Binning,
    output: PathBuf,
}

impl<'a> BinnerJob<'a> {
    pub fn new(
        track: &'a Track,
        windows: &'a [LabeledWindow],
        binning: Binning,
        output: PathBuf,
    ) -> Self {
        Self {
            track,
            windows,
            binning,
            output,
        }
    }

    /// Location of the binned matrix of the track inside the output directory.
    pub fn output_path(out: &Path, track: &Track) -> PathBuf {
        out.join("coverage").join(format!("{}.cov", track.index()))
    }

    fn bin(&self) -> Result<()> {
        let coverage = Coverage::from_path(self.track.file())?;

        let staging = engine::staging(&self.output);
        let mut writer = BinnedWriter::create(
            &staging,
            self.windows.len() as u64,
            self.binning.num_bins(),
        )?;

        let mut signal = vec![0.0; (self.binning.num_bins() * self.binning.width()) as usize];
        let mut row = vec![0.0; self.binning.num_bins() as usize];
        for labeled in self.windows {
            let region = labeled.window().region();
            let interval = self.binning.cropped(region.interval())?;
            coverage.fill(region.seqid(), interval, &mut signal)?;
            self.binning.aggregate(self.track, &mut signal, &mut row);
            writer.write_row(&row)?;
        }
        writer
            .finish()
            .wrap_err_with(|| format!("Failed to write {}", staging.display()))?;
        engine::commit(&self.output)
    }
}

impl Job for BinnerJob<'_> {
    fn name(&self) -> String {
        format!("track {}", self.track.identifier())
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output.clone()]
    }

    fn run(&self) -> Result<()> {
        self.bin().map_err(|source| {
            PrepError::TrackRead {
                track: self.track.identifier().clone(),
                source: source.into(),
            }
            .into()
        })
    }
}

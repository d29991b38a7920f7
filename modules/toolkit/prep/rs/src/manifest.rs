use crate::split::Split;
use crate::tiler::Window;
use derive_getters::{Dissolve, Getters};
use eyre::{Result, WrapErr};
use gentile_io_rs::bed::{self, Bed4};
use gentile_io_rs::WriteRecord;
use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, Dissolve)]
pub struct LabeledWindow {
    window: Window,
    split: Split,
}

/// All windows of the dataset: train, valid and test windows, each split in genome order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    windows: Vec<LabeledWindow>,
    ranges: [Range<usize>; 3],
}

impl Manifest {
    /// Windows of every split must already be in genome order.
    pub fn new(train: Vec<Window>, valid: Vec<Window>, test: Vec<Window>) -> Self {
        let mut windows = Vec::with_capacity(train.len() + valid.len() + test.len());
        let mut ranges: [Range<usize>; 3] = Default::default();
        for (split, split_windows) in [
            (Split::Train, train),
            (Split::Valid, valid),
            (Split::Test, test),
        ] {
            let start = windows.len();
            windows.extend(
                split_windows
                    .into_iter()
                    .map(|window| LabeledWindow { window, split }),
            );
            ranges[split.ind()] = start..windows.len();
        }
        Self { windows, ranges }
    }

    pub fn windows(&self) -> &[LabeledWindow] {
        &self.windows
    }

    /// Position of the split's windows in the manifest.
    pub fn range(&self, split: Split) -> Range<usize> {
        self.ranges[split.ind()].clone()
    }

    pub fn split(&self, split: Split) -> &[LabeledWindow] {
        &self.windows[self.range(split)]
    }

    pub fn count(&self, split: Split) -> usize {
        self.range(split).len()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Write the manifest as BED4 with the split label in the name column.
    pub fn write_bed(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = bed::Writer::<_, Bed4>::from_path(path)?;
        for labeled in &self.windows {
            let region = labeled.window.region();
            let record = Bed4::new(
                region.seqid().clone(),
                *region.interval(),
                labeled.split.to_string(),
            )?;
            writer.write_record(&record)?;
        }
        writer
            .finish()
            .wrap_err_with(|| format!("Failed to write {}", path.display()))
    }
}

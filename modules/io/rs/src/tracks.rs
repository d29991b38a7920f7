//! Sample track table: one coverage track per row, tab-separated with a header line.
//!
//! Required columns are `index`, `identifier`, `file`, `clip`, `sum_stat` and `description`;
//! `scale` and `clip_soft` are optional. Unknown columns are ignored.

use ahash::HashSet;
use derive_getters::{Dissolve, Getters};
use eyre::{ensure, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Aggregation of per-nucleotide values inside a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SumStat {
    #[default]
    Sum,
    Mean,
    Max,
    Median,
    SumSqrt,
}

impl SumStat {
    /// Aggregate the values; the slice may be reordered in the process.
    pub fn aggregate(&self, values: &mut [f32]) -> f32 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            SumStat::Sum => values.iter().sum(),
            SumStat::Mean => values.iter().sum::<f32>() / values.len() as f32,
            SumStat::Max => values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            SumStat::SumSqrt => values.iter().sum::<f32>().max(0.0).sqrt(),
            SumStat::Median => {
                let mid = values.len() / 2;
                let even = values.len() % 2 == 0;
                let (lower, upper, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
                let upper = *upper;
                if even {
                    // Even number of values: mean of the two central ones
                    let lower = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    (lower + upper) / 2.0
                } else {
                    upper
                }
            }
        }
    }
}

impl Display for SumStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let repr = match self {
            SumStat::Sum => "sum",
            SumStat::Mean => "mean",
            SumStat::Max => "max",
            SumStat::Median => "median",
            SumStat::SumSqrt => "sum_sqrt",
        };
        write!(f, "{repr}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Dissolve, Getters)]
pub struct Track {
    index: usize,
    identifier: String,
    file: PathBuf,
    clip: f32,
    sum_stat: SumStat,
    description: String,
    #[serde(default)]
    scale: Option<f32>,
    #[serde(default)]
    clip_soft: Option<f32>,
}

impl Track {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        identifier: String,
        file: PathBuf,
        clip: f32,
        sum_stat: SumStat,
        description: String,
        scale: Option<f32>,
        clip_soft: Option<f32>,
    ) -> Result<Self> {
        let track = Self {
            index,
            identifier,
            file,
            clip,
            sum_stat,
            description,
            scale,
            clip_soft,
        };
        track.validate()?;
        Ok(track)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.identifier.is_empty(), "Track identifier must not be empty");
        ensure!(
            self.clip.is_finite() && self.clip > 0.0,
            "Track {}: clip must be a positive number, got {}",
            self.identifier,
            self.clip
        );
        if let Some(scale) = self.scale {
            ensure!(
                scale.is_finite() && scale > 0.0,
                "Track {}: scale must be a positive number, got {}",
                self.identifier,
                scale
            );
        }
        if let Some(clip_soft) = self.clip_soft {
            ensure!(
                clip_soft.is_finite() && clip_soft > 0.0,
                "Track {}: clip_soft must be a positive number, got {}",
                self.identifier,
                clip_soft
            );
        }
        Ok(())
    }

    /// Clip a single per-nucleotide value to [0, clip]. NaN values are treated as zero.
    pub fn clip_value(&self, value: f32) -> f32 {
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, self.clip)
        }
    }

    /// Apply the soft clipping and scaling to an aggregated bin value.
    pub fn finalize(&self, mut value: f32) -> f32 {
        if let Some(threshold) = self.clip_soft {
            if value > threshold {
                value = threshold + (value - threshold).sqrt();
            }
        }
        value * self.scale.unwrap_or(1.0)
    }
}

/// An ordered, validated collection of tracks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TracksTable {
    tracks: Vec<Track>,
}

impl TracksTable {
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        ensure!(!tracks.is_empty(), "Track table must contain at least one track");

        let mut indices = HashSet::default();
        let mut identifiers = HashSet::default();
        for track in &tracks {
            track.validate()?;
            ensure!(
                indices.insert(track.index),
                "Duplicated track index: {}",
                track.index
            );
            ensure!(
                identifiers.insert(track.identifier.as_str()),
                "Duplicated track identifier: {}",
                track.identifier
            );
        }
        Ok(Self { tracks })
    }

    /// Parse the table. Relative track paths are resolved against `root`.
    pub fn from_reader(reader: impl Read, root: &Path) -> Result<Self> {
        let mut tracks = csv::ReaderBuilder::default()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
            .deserialize::<Track>()
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("Failed to parse the track table")?;

        for track in tracks.iter_mut() {
            if track.file.is_relative() {
                track.file = root.join(&track.file);
            }
        }
        Self::new(tracks)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("Failed to open the track table {}", path.display()))?;
        let root = path.parent().unwrap_or(Path::new("."));
        Self::from_reader(file, root)
            .wrap_err_with(|| format!("Invalid track table {}", path.display()))
    }

    pub fn write(&self, writer: impl Write) -> Result<()> {
        let mut writer = csv::WriterBuilder::default()
            .delimiter(b'\t')
            .has_headers(true)
            .from_writer(writer);
        for track in &self.tracks {
            writer.serialize(track)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

use crate::error::PrepError;
use crate::split::validate_fractions;
use derive_getters::Getters;
use eyre::{ensure, Result};
use gentile_core_rs::num::Fraction;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do with usable regions shorter than a single window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShortContigs {
    #[default]
    Drop,
    /// Join a short contig with the next one on the same chromosome if they are separated by at
    /// most `max_gap` nucleotides.
    Merge { max_gap: u64 },
}

/// Reproducible down-sampling of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DownSample {
    /// Keep a random subset of contigs covering the given fraction of the usable genome.
    Contigs { fraction: Fraction, seed: u64 },
    /// Keep the given fraction of windows in every split.
    Windows { fraction: Fraction, seed: u64 },
}

impl DownSample {
    pub fn fraction(&self) -> Fraction {
        match self {
            DownSample::Contigs { fraction, .. } | DownSample::Windows { fraction, .. } => {
                *fraction
            }
        }
    }
}

/// Handling of the contig tail that can't hold a full window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tail {
    #[default]
    Drop,
    /// Emit one more window aligned to the contig end.
    Pad,
}

/// Distance between consecutive window starts: values in (0, 1] are fractions of the window
/// length, larger values are absolute nucleotide counts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stride(f64);

impl Stride {
    pub fn new(stride: f64) -> Result<Self> {
        ensure!(
            stride.is_finite() && stride > 0.0,
            "Stride must be a positive number, got {stride}"
        );
        ensure!(
            stride <= 1.0 || stride.fract() == 0.0,
            "Stride above 1 must be a whole number of nucleotides, got {stride}"
        );
        Ok(Self(stride))
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Resolve the stride to nucleotides for windows of the given length.
    pub fn resolve(&self, length: u64, label: &str) -> Result<u64> {
        if self.0 > 1.0 {
            return Ok(self.0 as u64);
        }

        let resolved = self.0 * length as f64;
        log::info!("stride_{label} {} converted to {resolved:.6}", self.0);
        let resolved = resolved.round() as u64;
        ensure!(
            resolved >= 1,
            "stride_{label} {} resolves to less than one nucleotide",
            self.0
        );
        Ok(resolved)
    }
}

impl Default for Stride {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Immutable configuration of a single preparation run.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct Config {
    fasta: PathBuf,
    tracks: PathBuf,
    out: PathBuf,
    gaps: Option<PathBuf>,
    umap: Option<PathBuf>,
    umap_t: f64,
    length: u64,
    pool: u64,
    crop: u64,
    test: f64,
    valid: f64,
    tolerance: f64,
    stride_train: Stride,
    stride_test: Stride,
    snap: Option<u64>,
    tail: Tail,
    break_t: u64,
    short_contigs: ShortContigs,
    down_sample: Option<DownSample>,
    records_per_shard: usize,
    processes: isize,
    restart: bool,
}

impl Config {
    pub fn builder(
        fasta: impl Into<PathBuf>,
        tracks: impl Into<PathBuf>,
        out: impl Into<PathBuf>,
    ) -> ConfigBuilder {
        ConfigBuilder::new(fasta, tracks, out)
    }

    /// Number of bins per window after cropping.
    pub fn num_bins(&self) -> u64 {
        (self.length - 2 * self.crop) / self.pool
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(
        fasta: impl Into<PathBuf>,
        tracks: impl Into<PathBuf>,
        out: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config: Config {
                fasta: fasta.into(),
                tracks: tracks.into(),
                out: out.into(),
                gaps: None,
                umap: None,
                umap_t: 0.3,
                length: 131072,
                pool: 128,
                crop: 0,
                test: 0.05,
                valid: 0.05,
                tolerance: 0.02,
                stride_train: Stride::default(),
                stride_test: Stride::default(),
                snap: None,
                tail: Tail::Drop,
                break_t: 786432,
                short_contigs: ShortContigs::Drop,
                down_sample: None,
                records_per_shard: 256,
                processes: -1,
                restart: false,
            },
        }
    }

    pub fn set_gaps(mut self, gaps: Option<PathBuf>) -> Self {
        self.config.gaps = gaps;
        self
    }

    pub fn set_umap(mut self, umap: Option<PathBuf>, threshold: f64) -> Self {
        self.config.umap = umap;
        self.config.umap_t = threshold;
        self
    }

    pub fn set_length(mut self, length: u64) -> Self {
        self.config.length = length;
        self
    }

    pub fn set_pool(mut self, pool: u64) -> Self {
        self.config.pool = pool;
        self
    }

    pub fn set_crop(mut self, crop: u64) -> Self {
        self.config.crop = crop;
        self
    }

    pub fn set_fractions(mut self, test: f64, valid: f64) -> Self {
        self.config.test = test;
        self.config.valid = valid;
        self
    }

    pub fn set_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn set_strides(mut self, train: Stride, test: Stride) -> Self {
        self.config.stride_train = train;
        self.config.stride_test = test;
        self
    }

    pub fn set_snap(mut self, snap: Option<u64>) -> Self {
        self.config.snap = snap;
        self
    }

    pub fn set_tail(mut self, tail: Tail) -> Self {
        self.config.tail = tail;
        self
    }

    pub fn set_break(mut self, break_t: u64) -> Self {
        self.config.break_t = break_t;
        self
    }

    pub fn set_short_contigs(mut self, policy: ShortContigs) -> Self {
        self.config.short_contigs = policy;
        self
    }

    pub fn set_down_sample(mut self, down_sample: Option<DownSample>) -> Self {
        self.config.down_sample = down_sample;
        self
    }

    pub fn set_records_per_shard(mut self, records: usize) -> Self {
        self.config.records_per_shard = records;
        self
    }

    pub fn set_processes(mut self, processes: isize) -> Self {
        self.config.processes = processes;
        self
    }

    pub fn set_restart(mut self, restart: bool) -> Self {
        self.config.restart = restart;
        self
    }

    pub fn build(self) -> Result<Config> {
        let cfg = self.config;

        ensure!(cfg.length > 0, "Window length must be positive");
        ensure!(cfg.pool > 0, "Bin width must be positive");
        ensure!(
            2 * cfg.crop < cfg.length,
            "Cropping {} nt from both window ends leaves nothing of a {} nt window",
            cfg.crop,
            cfg.length
        );
        ensure!(
            (cfg.length - 2 * cfg.crop) % cfg.pool == 0,
            "Cropped window length {} must be a multiple of the bin width {}",
            cfg.length - 2 * cfg.crop,
            cfg.pool
        );

        validate_fractions(cfg.test, cfg.valid)?;
        if !(0.0..=1.0).contains(&cfg.tolerance) {
            return Err(PrepError::SplitInfeasible(format!(
                "tolerance must be in [0, 1], got {}",
                cfg.tolerance
            ))
            .into());
        }

        ensure!(
            (0.0..=1.0).contains(&cfg.umap_t),
            "Unmappable threshold must be in [0, 1], got {}",
            cfg.umap_t
        );
        ensure!(
            cfg.break_t >= cfg.length,
            "Break threshold {} must be at least the window length {}",
            cfg.break_t,
            cfg.length
        );
        if let Some(snap) = cfg.snap {
            ensure!(snap > 0, "Snap must be positive");
        }
        if let Some(down_sample) = cfg.down_sample {
            ensure!(
                down_sample.fraction().get() > 0.0,
                "Down-sampling fraction must be positive"
            );
        }
        ensure!(
            cfg.records_per_shard > 0,
            "Number of records per shard must be positive"
        );
        Ok(cfg)
    }
}

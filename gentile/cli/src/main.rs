use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use eyre::Result;

use gentile_core_rs::num::Fraction;
use gentile_prep_rs::{Config, DownSample, Preparer, ShortContigs, Split, Stride, Tail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TailArg {
    Drop,
    Pad,
}

impl From<TailArg> for Tail {
    fn from(value: TailArg) -> Self {
        match value {
            TailArg::Drop => Tail::Drop,
            TailArg::Pad => Tail::Pad,
        }
    }
}

/// Partition a genome into train/valid/test windows and package sequences with binned coverage
/// tracks into training shards.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Genome FASTA (plain or bgzip-compressed with a .gzi index)
    fasta: PathBuf,

    /// Sample table: index, identifier, file, clip, sum_stat, description
    targets: PathBuf,

    /// Output directory
    #[clap(short = 'o', long, default_value = "data_out")]
    out: PathBuf,

    /// Excluded regions (BED), e.g. assembly gaps
    #[clap(short = 'g', long)]
    gaps: Option<PathBuf>,

    /// Unmappable regions (BED) used to mask bins
    #[clap(short = 'u', long)]
    umap: Option<PathBuf>,

    /// Bins with a larger share of unmappable nucleotides are masked
    #[clap(long = "umap-t", default_value_t = 0.3)]
    umap_t: f64,

    /// Window length
    #[clap(short = 'l', long, default_value_t = 131072)]
    length: u64,

    /// Bin width
    #[clap(short = 'w', long, default_value_t = 128)]
    pool: u64,

    /// Nucleotides cropped from both window ends before binning
    #[clap(short = 'c', long, default_value_t = 0)]
    crop: u64,

    /// Fraction of the genome used for testing
    #[clap(short = 't', long, default_value_t = 0.05)]
    test: f64,

    /// Fraction of the genome used for validation
    #[clap(short = 'v', long, default_value_t = 0.05)]
    valid: f64,

    /// Allowed deviation of the realized split fractions
    #[clap(long, default_value_t = 0.02)]
    tolerance: f64,

    /// Stride of the training windows: a fraction of the window length or nucleotides
    #[clap(long = "stride-train", default_value_t = 1.0)]
    stride_train: f64,

    /// Stride of the validation and test windows
    #[clap(long = "stride-test", default_value_t = 1.0)]
    stride_test: f64,

    /// Align window starts to multiples of this value
    #[clap(long)]
    snap: Option<u64>,

    /// Handling of the contig tail that can't hold a full window
    #[clap(long, value_enum, default_value_t = TailArg::Drop)]
    tail: TailArg,

    /// Contigs longer than this are broken into pieces
    #[clap(long = "break", default_value_t = 786432)]
    break_t: u64,

    /// Join short contigs separated by at most this many nucleotides
    #[clap(long = "merge-gap")]
    merge_gap: Option<u64>,

    /// Down-sample the dataset to this fraction
    #[clap(short = 'd', long)]
    sample: Option<f64>,

    /// Down-sample windows within each split instead of whole contigs
    #[clap(long = "sample-windows", action = ArgAction::SetTrue)]
    sample_windows: bool,

    /// Random seed for the down-sampling
    #[clap(long, default_value_t = 44)]
    seed: u64,

    /// Records per shard
    #[clap(short = 'r', long, default_value_t = 256)]
    records: usize,

    /// Number of threads, negative values count back from all available cores
    #[clap(short = 'p', long, default_value_t = -1, allow_negative_numbers = true)]
    processes: isize,

    /// Skip jobs whose outputs already exist
    #[clap(long, action = ArgAction::SetTrue)]
    restart: bool,

    /// More logging, repeat for even more
    #[clap(long, action = ArgAction::Count)]
    verbose: u8,

    /// Less logging, repeat for even less
    #[clap(short = 'q', long, action = ArgAction::Count)]
    quiet: u8,
}

impl Args {
    fn level(&self) -> log::LevelFilter {
        match 2 + self.verbose as i16 - self.quiet as i16 {
            i16::MIN..=-1 => log::LevelFilter::Off,
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    fn config(&self) -> Result<Config> {
        let down_sample = match self.sample {
            Some(fraction) => {
                let fraction = Fraction::new(fraction)?;
                Some(if self.sample_windows {
                    DownSample::Windows {
                        fraction,
                        seed: self.seed,
                    }
                } else {
                    DownSample::Contigs {
                        fraction,
                        seed: self.seed,
                    }
                })
            }
            None => None,
        };
        let short_contigs = match self.merge_gap {
            Some(max_gap) => ShortContigs::Merge { max_gap },
            None => ShortContigs::Drop,
        };

        Config::builder(&self.fasta, &self.targets, &self.out)
            .set_gaps(self.gaps.clone())
            .set_umap(self.umap.clone(), self.umap_t)
            .set_length(self.length)
            .set_pool(self.pool)
            .set_crop(self.crop)
            .set_fractions(self.test, self.valid)
            .set_tolerance(self.tolerance)
            .set_strides(
                Stride::new(self.stride_train)?,
                Stride::new(self.stride_test)?,
            )
            .set_snap(self.snap)
            .set_tail(self.tail.into())
            .set_break(self.break_t)
            .set_short_contigs(short_contigs)
            .set_down_sample(down_sample)
            .set_records_per_shard(self.records)
            .set_processes(self.processes)
            .set_restart(self.restart)
            .build()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.level())
        .format_timestamp_secs()
        .init();

    let summary = Preparer::new(args.config()?)?.run()?;
    log::info!(
        "Wrote {} train, {} valid and {} test windows for {} tracks into {} shards at {}",
        summary.windows(Split::Train),
        summary.windows(Split::Valid),
        summary.windows(Split::Test),
        summary.tracks(),
        summary.shards(),
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() -> Result<()> {
        let args = Args::try_parse_from([
            "gentile", "genome.fa", "targets.txt", "-o", "out", "-p", "-2", "-t", "0.1", "-v",
            "0.2", "--tail", "pad", "-d", "0.5", "--sample-windows", "--merge-gap", "10",
            "--verbose", "--verbose",
        ])?;
        assert_eq!(args.processes, -2);
        assert_eq!(args.level(), log::LevelFilter::Trace);

        let config = args.config()?;
        assert_eq!(*config.test(), 0.1);
        assert_eq!(*config.valid(), 0.2);
        assert_eq!(*config.tail(), Tail::Pad);
        assert_eq!(
            *config.short_contigs(),
            ShortContigs::Merge { max_gap: 10 }
        );
        assert!(matches!(
            config.down_sample(),
            Some(DownSample::Windows { seed: 44, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let args = Args::try_parse_from(["gentile", "genome.fa", "targets.txt", "-qq"])?;
        assert_eq!(args.level(), log::LevelFilter::Error);

        let config = args.config()?;
        assert_eq!(*config.length(), 131072);
        assert_eq!(*config.processes(), -1);
        assert_eq!(*config.down_sample(), None);
        Ok(())
    }
}

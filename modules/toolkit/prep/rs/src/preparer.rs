use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use derive_getters::Getters;
use eyre::{ensure, Result, WrapErr};
use serde::Serialize;

use gentile_core_rs::loc::Region;
use gentile_io_rs::bed::{self, Bed3};
use gentile_io_rs::fasta::FaIndex;
use gentile_io_rs::tracks::TracksTable;
use gentile_io_rs::{ReadRecord, WriteRecord};

use crate::binner::{BinnerJob, Binning};
use crate::config::{Config, DownSample};
use crate::contigs::{Assembler, Contig};
use crate::engine::Engine;
use crate::error::PrepError;
use crate::manifest::Manifest;
use crate::mappable::Mappable;
use crate::mask::UnmappableMask;
use crate::split::{Allocation, Split};
use crate::stats::Statistics;
use crate::tiler::{sample_windows, Tiler, Window};
use crate::writer::{ShardJob, Sources};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize)]
pub struct Summary {
    contigs: usize,
    train: usize,
    valid: usize,
    test: usize,
    tracks: usize,
    shards: usize,
}

impl Summary {
    pub fn windows(&self, split: Split) -> usize {
        match split {
            Split::Train => self.train,
            Split::Valid => self.valid,
            Split::Test => self.test,
        }
    }
}

/// Runs the whole preparation: genome partitioning, coverage binning and record writing.
pub struct Preparer {
    config: Config,
    engine: Engine,
}

impl Preparer {
    pub fn new(config: Config) -> Result<Self> {
        for (label, path) in [
            ("FASTA", Some(config.fasta())),
            ("track table", Some(config.tracks())),
            ("excluded regions", config.gaps().as_ref()),
            ("unmappable regions", config.umap().as_ref()),
        ] {
            if let Some(path) = path {
                ensure!(
                    path.is_file(),
                    "The {label} file does not exist: {}",
                    path.display()
                );
            }
        }

        let engine = Engine::new(*config.processes(), *config.restart())?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self) -> Result<Summary> {
        let config = &self.config;
        let out = config.out().as_path();
        fs::create_dir_all(out)
            .wrap_err_with(|| format!("Failed to create the output directory {}", out.display()))?;
        let options = File::create(out.join("options.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(options), config)?;

        // Inputs are validated before any job is started
        let tracks = TracksTable::from_path(config.tracks())?;
        for track in tracks.tracks() {
            ensure!(
                track.file().is_file(),
                "Coverage file of the track {} does not exist: {}",
                track.identifier(),
                track.file().display()
            );
        }
        let binning = Binning::new(*config.length(), *config.crop(), *config.pool())?;

        let index = FaIndex::load(config.fasta())?;
        let excluded = match config.gaps() {
            Some(path) => read_regions(path)?,
            None => Vec::new(),
        };
        let mappable = Mappable::build(
            index.entries().iter().map(|x| (x.name().clone(), *x.length())),
            excluded,
        )?;
        log::info!(
            "{} reference sequences, {} nt total",
            mappable.chromosomes().len(),
            mappable.total()
        );

        let contigs = Assembler::new(
            *config.length(),
            *config.short_contigs(),
            *config.break_t(),
            *config.down_sample(),
        )
        .assemble(&mappable)?;
        let allocation = Allocation::allocate(
            &contigs,
            *config.test(),
            *config.valid(),
            *config.tolerance(),
        )?;
        log::info!("{}", allocation.summary());

        let manifest = self.tile(&contigs, &allocation)?;
        ensure!(!manifest.is_empty(), "No windows left after tiling the contigs");
        log::info!(
            "Windows: {} train, {} valid, {} test",
            manifest.count(Split::Train),
            manifest.count(Split::Valid),
            manifest.count(Split::Test)
        );

        write_contigs(&contigs, out.join("contigs.bed"))?;
        manifest.write_bed(out.join("sequences.bed"))?;
        tracks.write(BufWriter::new(File::create(out.join("targets.txt"))?))?;

        let mut unmappable = mappable.excluded().collect::<Vec<_>>();
        if let Some(path) = config.umap() {
            unmappable.extend(read_regions(path)?);
        }
        let mask = UnmappableMask::new(unmappable);

        // Coverage tracks are binned first, records depend on all of them
        fs::create_dir_all(out.join("coverage"))?;
        let coverage = tracks
            .tracks()
            .iter()
            .map(|track| BinnerJob::output_path(out, track))
            .collect::<Vec<_>>();
        let jobs = tracks
            .tracks()
            .iter()
            .zip(&coverage)
            .map(|(track, path)| BinnerJob::new(track, manifest.windows(), binning, path.clone()))
            .collect::<Vec<_>>();
        self.engine.run("binning", &jobs)?;

        for split in Split::ALL {
            fs::create_dir_all(out.join("records").join(split.as_str()))?;
        }
        let sources = Sources::new(
            config.fasta(),
            &index,
            coverage,
            manifest.len(),
            &mask,
            binning,
            *config.umap_t(),
        )?;
        let shards = ShardJob::partition(&manifest, &sources, *config.records_per_shard(), out)?;
        self.engine.run("writing", &shards)?;

        Statistics::new(config, &manifest, tracks.len()).write(out.join("statistics.json"))?;

        Ok(Summary {
            contigs: contigs.len(),
            train: manifest.count(Split::Train),
            valid: manifest.count(Split::Valid),
            test: manifest.count(Split::Test),
            tracks: tracks.len(),
            shards: shards.len(),
        })
    }

    /// Tile contigs of every split. Validation and test windows share the same stride.
    fn tile(&self, contigs: &[Contig], allocation: &Allocation) -> Result<Manifest> {
        let config = &self.config;
        let length = *config.length();
        let train = Tiler::new(
            length,
            config.stride_train().resolve(length, "train")?,
            *config.snap(),
            *config.tail(),
        )?;
        let test = Tiler::new(
            length,
            config.stride_test().resolve(length, "test")?,
            *config.snap(),
            *config.tail(),
        )?;

        let mut windows: [Vec<Window>; 3] = Default::default();
        for (split, into) in Split::ALL.into_iter().zip(windows.iter_mut()) {
            let tiler = match split {
                Split::Train => train,
                Split::Valid | Split::Test => test,
            };
            for ind in allocation.contigs(split) {
                into.extend(tiler.tile(*ind, &contigs[*ind])?);
            }

            if let Some(DownSample::Windows { fraction, seed }) = config.down_sample() {
                let total = into.len();
                *into = sample_windows(std::mem::take(into), *fraction, *seed);
                log::info!("{split}: {} out of {total} windows sampled", into.len());
            }
        }

        let [train, valid, test] = windows;
        Ok(Manifest::new(train, valid, test))
    }
}

/// Read exclusion intervals. Malformed rows are reported as [PrepError::InvalidRegion] while
/// IO failures keep their original cause.
fn read_regions(path: &Path) -> Result<Vec<Region>> {
    let invalid = |err: eyre::Report| -> eyre::Report {
        if err.downcast_ref::<std::io::Error>().is_some() {
            return err.wrap_err(format!("Failed to read {}", path.display()));
        }
        PrepError::InvalidRegion {
            region: path.display().to_string(),
            reason: format!("{err:#}"),
        }
        .into()
    };

    let mut records = Vec::new();
    bed::Reader::<_, Bed3>::from_path(path)?
        .read_to_end(&mut records)
        .map_err(invalid)?;
    records
        .into_iter()
        .map(|x| Region::try_from(x).map_err(invalid))
        .collect()
}

fn write_contigs(contigs: &[Contig], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = bed::Writer::<_, Bed3>::from_path(path)?;
    for contig in contigs {
        writer.write_record(&Bed3::from(contig.region().clone()))?;
    }
    writer.finish()
}

use std::fs;
use std::path::{Path, PathBuf};

use eyre::Result;

use gentile_io_rs::records::{Record, ShardReader};
use gentile_io_rs::ReadRecord;
use gentile_prep_rs::dna;
use gentile_prep_rs::writer::ShardJob;
use gentile_prep_rs::{
    Config, ConfigBuilder, PrepError, Preparer, ShortContigs, Split, Statistics,
};

const THREADS: isize = 2;
const LENGTH: u64 = 40;
const POOL: u64 = 10;
const CROP: u64 = 5;
const GENOME: &[(&str, usize)] = &[("chr1", 400), ("chr2", 200)];

fn sequence(seed: usize, length: usize) -> Vec<u8> {
    (0..length)
        .map(|x| b"ACGTNacgtR"[(x * 7 + x / 3 + seed) % 10])
        .collect()
}

struct Fixture {
    dir: tempfile::TempDir,
    sequences: Vec<(String, Vec<u8>)>,
}

impl Fixture {
    fn new(tracks: &[(&str, &str, &str)]) -> Result<Self> {
        let dir = tempfile::tempdir()?;

        let mut fasta = String::new();
        let mut sequences = Vec::new();
        for (seed, (name, length)) in GENOME.iter().enumerate() {
            let seq = sequence(seed, *length);
            fasta.push_str(&format!(">{name}\n"));
            for line in seq.chunks(60) {
                fasta.push_str(std::str::from_utf8(line)?);
                fasta.push('\n');
            }
            sequences.push((name.to_string(), seq));
        }
        fs::write(dir.path().join("genome.fa"), fasta)?;
        fs::write(dir.path().join("gaps.bed"), "chr1\t200\t240\tgap\n")?;
        fs::write(dir.path().join("umap.bed"), "chr2\t0\t15\n")?;

        let mut table = String::from("index\tidentifier\tfile\tclip\tsum_stat\tdescription\n");
        for (ind, (identifier, sum_stat, bedgraph)) in tracks.iter().enumerate() {
            let file = format!("{identifier}.bedgraph");
            fs::write(dir.path().join(&file), bedgraph)?;
            table.push_str(&format!(
                "{ind}\t{identifier}\t{file}\t384\t{sum_stat}\t{identifier} signal\n"
            ));
        }
        fs::write(dir.path().join("targets.txt"), table)?;

        Ok(Self { dir, sequences })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn out(&self) -> PathBuf {
        self.path("out")
    }

    fn config(&self, restart: bool) -> Result<Config> {
        self.builder(restart).build()
    }

    fn builder(&self, restart: bool) -> ConfigBuilder {
        Config::builder(self.path("genome.fa"), self.path("targets.txt"), self.out())
            .set_gaps(Some(self.path("gaps.bed")))
            .set_umap(Some(self.path("umap.bed")), 0.3)
            .set_length(LENGTH)
            .set_pool(POOL)
            .set_crop(CROP)
            .set_fractions(0.3, 0.3)
            .set_tolerance(0.1)
            .set_break(1_000)
            .set_records_per_shard(3)
            .set_processes(THREADS)
            .set_restart(restart)
    }

    fn sequence(&self, seqid: &str, start: u64, end: u64) -> Vec<u8> {
        let (_, seq) = self
            .sequences
            .iter()
            .find(|(name, _)| name == seqid)
            .unwrap();
        seq[start as usize..end as usize]
            .iter()
            .map(|x| dna::decode(dna::encode(*x)))
            .collect()
    }
}

fn read_split(out: &Path, split: Split, shards: usize) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for shard in 0..shards {
        let mut batch = Vec::new();
        ShardReader::open(ShardJob::output_path(out, split, shard))?.read_to_end(&mut batch)?;
        records.extend(batch);
    }
    Ok(records)
}

// Nucleotides of [start, end) covered by [0, 100)
fn peak(start: u64, end: u64) -> f32 {
    end.min(100).saturating_sub(start) as f32
}

#[test]
fn pipeline() -> Result<()> {
    let fixture = Fixture::new(&[
        ("const", "sum", "chr1\t0\t400\t2\nchr2\t0\t200\t2\n"),
        ("peak", "mean", "track type=bedGraph\nchr1\t0\t100\t1000\n"),
    ])?;
    let summary = Preparer::new(fixture.config(false)?)?.run()?;

    // chr1:[0, 200) goes to test, chr2:[0, 200) to valid and chr1:[240, 400) to train
    assert_eq!(*summary.contigs(), 3);
    assert_eq!(
        (
            summary.windows(Split::Train),
            summary.windows(Split::Valid),
            summary.windows(Split::Test)
        ),
        (4, 5, 5)
    );
    assert_eq!(*summary.tracks(), 2);
    assert_eq!(*summary.shards(), 6);

    let out = fixture.out();
    let manifest = fs::read_to_string(out.join("sequences.bed"))?;
    let manifest = manifest.lines().collect::<Vec<_>>();
    assert_eq!(manifest.len(), 14);
    assert_eq!(manifest[0], "chr1\t240\t280\ttrain");
    assert_eq!(manifest[4], "chr2\t0\t40\tvalid");
    assert_eq!(manifest[13], "chr1\t160\t200\ttest");

    assert_eq!(
        fs::read_to_string(out.join("contigs.bed"))?,
        "chr1\t0\t200\nchr1\t240\t400\nchr2\t0\t200\n"
    );
    assert!(out.join("targets.txt").exists());
    assert!(out.join("options.json").exists());

    let statistics = Statistics::read(out.join("statistics.json"))?;
    assert_eq!(*statistics.target_length(), 3);
    assert_eq!(*statistics.num_targets(), 2);
    assert_eq!(
        (
            *statistics.train_seqs(),
            *statistics.valid_seqs(),
            *statistics.test_seqs()
        ),
        (4, 5, 5)
    );

    let mut row = 0;
    for split in Split::ALL {
        let records = read_split(&out, split, 2)?;
        assert_eq!(records.len(), summary.windows(split));

        for record in records {
            let fields = manifest[row].split('\t').collect::<Vec<_>>();
            row += 1;
            assert_eq!(record.seqid(), fields[0]);
            assert_eq!(record.start().to_string(), fields[1]);
            assert_eq!(record.end().to_string(), fields[2]);
            assert_eq!(record.split(), fields[3]);

            let mut decoded = Vec::new();
            dna::decode_into(record.sequence(), &mut decoded);
            assert_eq!(
                decoded,
                fixture.sequence(record.seqid(), *record.start(), *record.end())
            );

            assert_eq!(*record.num_targets(), 2);
            assert_eq!(record.num_bins(), 3);
            for bin in 0..3 {
                let start = record.start() + CROP + bin as u64 * POOL;
                let peak = if record.seqid() == "chr1" {
                    384.0 * peak(start, start + POOL) / POOL as f32
                } else {
                    0.0
                };
                assert_eq!(record.targets()[bin * 2], 20.0);
                assert_eq!(record.targets()[bin * 2 + 1], peak);
            }

            let masked = record.seqid() == "chr2" && *record.start() == 0;
            assert_eq!(record.mask(), &vec![masked, false, false]);
        }
    }
    assert_eq!(row, manifest.len());

    // Nothing is recomputed on restart
    let restarted = Preparer::new(fixture.config(true)?)?.run()?;
    assert_eq!(restarted, summary);
    Ok(())
}

#[test]
fn merged_gap_is_masked() -> Result<()> {
    let fixture = Fixture::new(&[("const", "sum", "chr1\t0\t400\t2\nchr2\t0\t200\t2\n")])?;
    // chr1:[240, 270) is too short on its own and is joined with chr1:[275, 400)
    fs::write(fixture.path("gaps.bed"), "chr1\t200\t240\nchr1\t270\t275\n")?;
    let config = fixture
        .builder(false)
        .set_short_contigs(ShortContigs::Merge { max_gap: 5 })
        .build()?;
    let summary = Preparer::new(config)?.run()?;
    assert_eq!(*summary.contigs(), 3);

    let out = fixture.out();
    assert_eq!(
        fs::read_to_string(out.join("contigs.bed"))?,
        "chr1\t0\t200\nchr1\t240\t400\nchr2\t0\t200\n"
    );

    // The last bin of chr1:[240, 280) is [265, 275), half of it is the gap
    let records = read_split(&out, Split::Train, 2)?;
    assert_eq!(records.len(), 4);
    for record in records {
        assert_eq!(record.seqid(), "chr1");
        let expected = if *record.start() == 240 {
            vec![false, false, true]
        } else {
            vec![false; 3]
        };
        assert_eq!(record.mask(), &expected, "{}", record.start());
    }
    Ok(())
}

#[test]
fn failing_track() -> Result<()> {
    let fixture = Fixture::new(&[
        ("const", "sum", "chr1\t0\t400\t2\nchr2\t0\t200\t2\n"),
        ("broken", "max", "chr1\t0\t100\t1\nchr1\t50\t150\t1\n"),
    ])?;
    let err = Preparer::new(fixture.config(false)?)?.run().unwrap_err();

    match err.downcast_ref::<PrepError>() {
        Some(PrepError::TrackRead { track, .. }) => assert_eq!(track, "broken"),
        other => panic!("Unexpected error: {other:?}"),
    }

    let coverage = fixture.out().join("coverage");
    assert!(!coverage.join("1.cov").exists());
    assert!(!coverage.join("1.cov.tmp").exists());
    // Records are never written after a failed binning
    assert!(!fixture.out().join("statistics.json").exists());
    assert!(!ShardJob::output_path(&fixture.out(), Split::Train, 0).exists());
    Ok(())
}

#[test]
fn invalid_inputs() -> Result<()> {
    let fixture = Fixture::new(&[("const", "sum", "chr1\t0\t400\t2\n")])?;

    // Infeasible fractions are rejected before anything is written
    let err = Config::builder(
        fixture.path("genome.fa"),
        fixture.path("targets.txt"),
        fixture.out(),
    )
    .set_fractions(0.7, 0.5)
    .build()
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PrepError>(),
        Some(PrepError::SplitInfeasible(_))
    ));

    // Exclusions beyond the chromosome end and malformed exclusion rows
    for (gaps, umap) in [
        ("chr2\t150\t250\n", "chr2\t0\t15\n"),
        ("chr1\t240\t200\n", "chr2\t0\t15\n"),
        ("chr1\t200\t240\n", "chr2\tX\t15\n"),
        ("chr1\t200\t240\n", "chr2\t15\t15\n"),
    ] {
        fs::write(fixture.path("gaps.bed"), gaps)?;
        fs::write(fixture.path("umap.bed"), umap)?;
        let err = Preparer::new(fixture.config(false)?)?.run().unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<PrepError>(),
                Some(PrepError::InvalidRegion { .. })
            ),
            "{gaps:?} {umap:?}: {err:?}"
        );
    }

    fs::remove_file(fixture.path("genome.fa"))?;
    assert!(Preparer::new(fixture.config(false)?).is_err());
    Ok(())
}

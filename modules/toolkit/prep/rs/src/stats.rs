use crate::config::Config;
use crate::manifest::Manifest;
use crate::split::Split;
use derive_getters::Getters;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Dataset description consumed by the training code.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Statistics {
    seq_length: u64,
    pool_width: u64,
    crop_bp: u64,
    target_length: u64,
    num_targets: usize,
    train_seqs: usize,
    valid_seqs: usize,
    test_seqs: usize,
    records_per_shard: usize,
}

impl Statistics {
    pub fn new(config: &Config, manifest: &Manifest, num_targets: usize) -> Self {
        Self {
            seq_length: *config.length(),
            pool_width: *config.pool(),
            crop_bp: *config.crop(),
            target_length: config.num_bins(),
            num_targets,
            train_seqs: manifest.count(Split::Train),
            valid_seqs: manifest.count(Split::Valid),
            test_seqs: manifest.count(Split::Test),
            records_per_shard: *config.records_per_shard(),
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(
            File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?,
        );
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("Invalid statistics file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiler::Window;
    use gentile_core_rs::loc::Region;

    #[test]
    fn test_statistics() -> Result<()> {
        let config = Config::builder("genome.fa", "targets.txt", "out")
            .set_length(1024)
            .set_pool(32)
            .set_crop(64)
            .build()?;
        let window = |start| Window::new(0, Region::new("chr1", start, start + 1024).unwrap());
        let manifest = Manifest::new(vec![window(0), window(1024)], vec![], vec![window(2048)]);

        let statistics = Statistics::new(&config, &manifest, 3);
        assert_eq!(*statistics.target_length(), 28);
        assert_eq!(
            (
                *statistics.train_seqs(),
                *statistics.valid_seqs(),
                *statistics.test_seqs()
            ),
            (2, 0, 1)
        );

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("statistics.json");
        statistics.write(&path)?;

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(json["seq_length"], 1024);
        assert_eq!(json["pool_width"], 32);
        assert_eq!(json["crop_bp"], 64);
        assert_eq!(json["num_targets"], 3);
        assert_eq!(json["records_per_shard"], 256);
        assert_eq!(Statistics::read(&path)?, statistics);
        Ok(())
    }
}

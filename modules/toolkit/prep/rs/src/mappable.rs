use crate::error::PrepError;
use ahash::HashMap;
use derive_getters::{Dissolve, Getters};
use eyre::Result;
use gentile_core_rs::loc::{Interval, IntervalOp, Region};

/// A reference sequence split into excluded and usable (mappable) parts.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Dissolve)]
pub struct Chromosome {
    name: String,
    length: u64,
    // Sorted, merged exclusions
    excluded: Vec<Interval<u64>>,
    // Complement of the exclusions within [0, length)
    mappable: Vec<Interval<u64>>,
}

/// Usable regions of the genome, chromosomes in the genome index order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mappable {
    chromosomes: Vec<Chromosome>,
}

impl Mappable {
    /// Complement the excluded regions within each chromosome. Exclusions may come in any order
    /// and overlap or touch each other. Exclusions on unknown chromosomes or beyond the
    /// chromosome end are rejected.
    pub fn build(
        chromosomes: impl IntoIterator<Item = (String, u64)>,
        excluded: impl IntoIterator<Item = Region>,
    ) -> Result<Self> {
        let chromosomes = chromosomes.into_iter().collect::<Vec<_>>();
        let lookup: HashMap<&str, usize> = chromosomes
            .iter()
            .enumerate()
            .map(|(ind, (name, _))| (name.as_str(), ind))
            .collect();

        let mut grouped: Vec<Vec<Interval<u64>>> = vec![Vec::new(); chromosomes.len()];
        for region in excluded {
            let Some(&ind) = lookup.get(region.seqid().as_str()) else {
                return Err(PrepError::InvalidRegion {
                    region: region.to_string(),
                    reason: "unknown chromosome".to_string(),
                }
                .into());
            };
            let length = chromosomes[ind].1;
            if region.end() > length {
                return Err(PrepError::InvalidRegion {
                    region: region.to_string(),
                    reason: format!("end exceeds the chromosome length {length}"),
                }
                .into());
            }
            grouped[ind].push(*region.interval());
        }

        let chromosomes = chromosomes
            .into_iter()
            .zip(grouped)
            .map(|((name, length), mut excluded)| {
                Interval::merge(&mut excluded);
                let mappable = match Interval::new(0, length) {
                    Ok(within) => Interval::complement(&excluded, within),
                    // Zero-length sequences have nothing to offer
                    Err(_) => Vec::new(),
                };
                Chromosome {
                    name,
                    length,
                    excluded,
                    mappable,
                }
            })
            .collect();
        Ok(Self { chromosomes })
    }

    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    /// Total number of usable nucleotides.
    pub fn total(&self) -> u64 {
        self.chromosomes
            .iter()
            .flat_map(|x| x.mappable.iter())
            .map(|x| x.len())
            .sum()
    }

    /// All merged exclusions as genomic regions, in genome order.
    pub fn excluded(&self) -> impl Iterator<Item = Region> + '_ {
        self.chromosomes.iter().flat_map(|chr| {
            chr.excluded.iter().filter_map(|interval| {
                Region::from_interval(chr.name.clone(), *interval).ok()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genome() -> Vec<(String, u64)> {
        vec![("chr1".to_string(), 1000), ("chr2".to_string(), 500)]
    }

    #[test]
    fn test_complement() -> Result<()> {
        let excluded = vec![
            Region::new("chr1", 500, 600)?,
            Region::new("chr1", 0, 10)?,
            Region::new("chr1", 550, 700)?,
            Region::new("chr1", 700, 710)?,
            Region::new("chr2", 0, 500)?,
        ];
        let mappable = Mappable::build(genome(), excluded)?;

        let chr1 = &mappable.chromosomes()[0];
        assert_eq!(chr1.excluded(), &[(0, 10), (500, 710)]);
        assert_eq!(chr1.mappable(), &[(10, 500), (710, 1000)]);

        // Fully excluded chromosome
        let chr2 = &mappable.chromosomes()[1];
        assert!(chr2.mappable().is_empty());

        assert_eq!(mappable.total(), 490 + 290);
        assert_eq!(mappable.excluded().count(), 3);
        Ok(())
    }

    #[test]
    fn test_exclusions_and_mappable_tile_chromosomes() -> Result<()> {
        let excluded = vec![
            Region::new("chr1", 100, 200)?,
            Region::new("chr1", 150, 250)?,
            Region::new("chr2", 499, 500)?,
        ];
        let mappable = Mappable::build(genome(), excluded)?;
        for chr in mappable.chromosomes() {
            let mut parts = chr
                .excluded()
                .iter()
                .chain(chr.mappable().iter())
                .copied()
                .collect::<Vec<_>>();
            parts.sort();
            assert_eq!(parts.first().map(|x| x.start()), Some(0));
            assert_eq!(parts.last().map(|x| x.end()), Some(*chr.length()));
            for pair in parts.windows(2) {
                assert_eq!(pair[0].end(), pair[1].start());
            }
        }
        Ok(())
    }

    #[test]
    fn test_no_exclusions() -> Result<()> {
        let mappable = Mappable::build(genome(), Vec::new())?;
        assert_eq!(mappable.total(), 1500);
        Ok(())
    }

    #[test]
    fn test_invalid_exclusions() -> Result<()> {
        for region in [Region::new("chrM", 0, 10)?, Region::new("chr2", 400, 501)?] {
            let err = Mappable::build(genome(), vec![region]).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PrepError>(),
                Some(PrepError::InvalidRegion { .. })
            ));
        }
        Ok(())
    }
}

use crate::config::{DownSample, ShortContigs};
use crate::error::PrepError;
use crate::mappable::Mappable;
use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use eyre::Result;
use gentile_core_rs::loc::{Interval, IntervalOp, Region};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BinaryHeap;

/// A usable stretch of a chromosome. Contigs are ordered by the chromosome rank in the genome
/// index and then by their start.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Getters, Dissolve, Serialize, Constructor,
)]
pub struct Contig {
    rank: usize,
    region: Region,
}

impl Contig {
    pub fn seqid(&self) -> &str {
        self.region.seqid()
    }

    pub fn start(&self) -> u64 {
        self.region.start()
    }

    pub fn end(&self) -> u64 {
        self.region.end()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.region.len()
    }

    fn with_interval(&self, interval: Interval<u64>) -> Result<Self> {
        let region = Region::from_interval(self.seqid(), interval)?;
        Ok(Self::new(self.rank, region))
    }
}

/// Turns usable genome regions into contigs suitable for tiling with windows of a fixed length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assembler {
    length: u64,
    short: ShortContigs,
    break_t: u64,
    down_sample: Option<DownSample>,
}

impl Assembler {
    pub fn new(
        length: u64,
        short: ShortContigs,
        break_t: u64,
        down_sample: Option<DownSample>,
    ) -> Self {
        Self {
            length,
            short,
            break_t,
            down_sample,
        }
    }

    pub fn assemble(&self, mappable: &Mappable) -> Result<Vec<Contig>> {
        let mut contigs = Vec::new();
        for (rank, chr) in mappable.chromosomes().iter().enumerate() {
            for interval in chr.mappable() {
                contigs.push(Contig::new(
                    rank,
                    Region::from_interval(chr.name().as_str(), *interval)?,
                ));
            }
        }

        let contigs = self.handle_short(contigs)?;
        let mut contigs = self.break_long(contigs)?;
        contigs.sort();

        if let Some(DownSample::Contigs { fraction, seed }) = self.down_sample {
            let total: u64 = contigs.iter().map(|x| x.len()).sum();
            let target = fraction.get() * total as f64;

            let mut rng = StdRng::seed_from_u64(seed);
            contigs.shuffle(&mut rng);

            let mut taken = 0u64;
            let mut selected = Vec::new();
            for contig in contigs {
                if taken as f64 >= target {
                    break;
                }
                taken += contig.len();
                selected.push(contig);
            }
            selected.sort();
            log::info!(
                "Down-sampled contigs to {} nt ({:.4} of {} nt)",
                taken,
                taken as f64 / total.max(1) as f64,
                total
            );
            contigs = selected;
        }

        if contigs.is_empty() {
            return Err(PrepError::InsufficientContig(format!(
                "no usable region of at least {} nt",
                self.length
            ))
            .into());
        }

        log::info!(
            "Assembled {} contigs with {} nt",
            contigs.len(),
            contigs.iter().map(|x| x.len()).sum::<u64>()
        );
        Ok(contigs)
    }

    fn handle_short(&self, contigs: Vec<Contig>) -> Result<Vec<Contig>> {
        let contigs = match self.short {
            ShortContigs::Drop => contigs,
            ShortContigs::Merge { max_gap } => {
                let mut merged: Vec<Contig> = Vec::with_capacity(contigs.len());
                for contig in contigs {
                    match merged.last_mut() {
                        Some(last)
                            if last.rank == contig.rank
                                && last.len() < self.length
                                && contig.start() - last.end() <= max_gap =>
                        {
                            let joined = Interval::new(last.start(), contig.end())?;
                            *last = last.with_interval(joined)?;
                        }
                        _ => merged.push(contig),
                    }
                }
                merged
            }
        };

        let (kept, dropped): (Vec<_>, Vec<_>) =
            contigs.into_iter().partition(|x| x.len() >= self.length);
        if !dropped.is_empty() {
            log::warn!(
                "Dropped {} contigs shorter than {} nt ({} nt in total)",
                dropped.len(),
                self.length,
                dropped.iter().map(|x| x.len()).sum::<u64>()
            );
        }
        Ok(kept)
    }

    // The left part holds a whole number of windows whenever the contig fits at least two
    fn split_point(&self, contig: &Contig) -> u64 {
        let windows = contig.len() / self.length;
        if windows >= 2 {
            contig.start() + (windows / 2) * self.length
        } else {
            contig.start() + contig.len() / 2
        }
    }

    fn break_long(&self, contigs: Vec<Contig>) -> Result<Vec<Contig>> {
        let mut result = Vec::with_capacity(contigs.len());
        let mut heap = BinaryHeap::new();
        for contig in contigs {
            if contig.len() > self.break_t {
                heap.push((contig.len(), std::cmp::Reverse(contig)));
            } else {
                result.push(contig);
            }
        }

        // Largest contigs are broken first
        while let Some((_, std::cmp::Reverse(contig))) = heap.pop() {
            let point = self.split_point(&contig);
            for piece in [
                contig.with_interval(Interval::new(contig.start(), point)?)?,
                contig.with_interval(Interval::new(point, contig.end())?)?,
            ] {
                if piece.len() > self.break_t {
                    heap.push((piece.len(), std::cmp::Reverse(piece)));
                } else if piece.len() >= self.length {
                    result.push(piece);
                } else {
                    log::warn!(
                        "Dropped a {} nt piece of {} after breaking",
                        piece.len(),
                        contig.region()
                    );
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gentile_core_rs::num::Fraction;

    fn mappable(excluded: &[(&str, u64, u64)]) -> Mappable {
        let genome = vec![("chr1".to_string(), 1000), ("chr2".to_string(), 1000)];
        let excluded = excluded
            .iter()
            .map(|(seqid, start, end)| Region::new(*seqid, *start, *end).unwrap())
            .collect::<Vec<_>>();
        Mappable::build(genome, excluded).unwrap()
    }

    fn bounds(contigs: &[Contig]) -> Vec<(&str, u64, u64)> {
        contigs
            .iter()
            .map(|x| (x.seqid(), x.start(), x.end()))
            .collect()
    }

    #[test]
    fn test_drop_short() -> Result<()> {
        let mappable = mappable(&[("chr1", 50, 100), ("chr2", 0, 950)]);
        let contigs = Assembler::new(100, ShortContigs::Drop, 10_000, None).assemble(&mappable)?;
        assert_eq!(bounds(&contigs), vec![("chr1", 100, 1000)]);
        Ok(())
    }

    #[test]
    fn test_merge_short() -> Result<()> {
        let mappable = mappable(&[("chr1", 50, 60), ("chr1", 100, 500), ("chr2", 0, 950)]);
        let merge = ShortContigs::Merge { max_gap: 10 };
        let contigs = Assembler::new(100, merge, 10_000, None).assemble(&mappable)?;
        // [0, 50) is joined with [60, 100) across the 10 nt gap
        assert_eq!(
            bounds(&contigs),
            vec![("chr1", 0, 100), ("chr1", 500, 1000)]
        );

        let merge = ShortContigs::Merge { max_gap: 5 };
        let contigs = Assembler::new(100, merge, 10_000, None).assemble(&mappable)?;
        assert_eq!(bounds(&contigs), vec![("chr1", 500, 1000)]);
        Ok(())
    }

    #[test]
    fn test_break_long() -> Result<()> {
        let mappable = mappable(&[("chr1", 500, 600)]);
        let contigs = Assembler::new(100, ShortContigs::Drop, 200, None).assemble(&mappable)?;
        assert_eq!(
            bounds(&contigs),
            vec![
                ("chr1", 0, 200),
                ("chr1", 200, 300),
                ("chr1", 300, 500),
                ("chr1", 600, 800),
                ("chr1", 800, 1000),
                ("chr2", 0, 200),
                ("chr2", 200, 300),
                ("chr2", 300, 500),
                ("chr2", 500, 700),
                ("chr2", 700, 800),
                ("chr2", 800, 1000),
            ]
        );
        assert!(contigs.iter().all(|x| x.len() <= 200 && x.len() % 100 == 0));
        Ok(())
    }

    #[test]
    fn test_down_sample() -> Result<()> {
        let mappable = mappable(&[]);
        let down_sample = DownSample::Contigs {
            fraction: Fraction::new(0.5)?,
            seed: 44,
        };
        let assembler = Assembler::new(100, ShortContigs::Drop, 100, Some(down_sample));
        let first = assembler.assemble(&mappable)?;
        assert_eq!(first.len(), 10);
        assert!(first.windows(2).all(|x| x[0] < x[1]));

        // Reproducible
        assert_eq!(assembler.assemble(&mappable)?, first);
        Ok(())
    }

    #[test]
    fn test_insufficient() {
        let mappable = mappable(&[("chr1", 10, 1000), ("chr2", 0, 990)]);
        let err = Assembler::new(100, ShortContigs::Drop, 1000, None)
            .assemble(&mappable)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PrepError>(),
            Some(PrepError::InsufficientContig(_))
        ));
    }
}

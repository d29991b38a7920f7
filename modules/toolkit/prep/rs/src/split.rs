use crate::contigs::Contig;
use crate::error::PrepError;
use derive_getters::Getters;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// All splits in the manifest order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }

    pub(crate) fn ind(&self) -> usize {
        match self {
            Split::Train => 0,
            Split::Valid => 1,
            Split::Test => 2,
        }
    }
}

impl Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "valid" => Ok(Split::Valid),
            "test" => Ok(Split::Test),
            _ => Err(eyre::eyre!("Unknown split: {s}")),
        }
    }
}

/// Reject fractions outside of [0, 1] or summing above 1.
pub fn validate_fractions(test: f64, valid: f64) -> Result<()> {
    for (name, value) in [("test", test), ("valid", valid)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(PrepError::SplitInfeasible(format!(
                "{name} fraction must be in [0, 1], got {value}"
            ))
            .into());
        }
    }
    if test + valid > 1.0 {
        return Err(PrepError::SplitInfeasible(format!(
            "test ({test}) and valid ({valid}) fractions sum above 1"
        ))
        .into());
    }
    Ok(())
}

/// Assignment of whole contigs to splits.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct Allocation {
    // Indices of the allocated contigs, per split, in genome order
    #[getter(skip)]
    assigned: [Vec<usize>; 3],
    #[getter(skip)]
    lengths: [u64; 3],
    total: u64,
}

impl Allocation {
    /// Visit contigs from the largest to the smallest (ties keep the genome order) and place each
    /// into the first of test/valid that still lacks sequence and can take the contig without
    /// overshooting its aim by more than `tolerance × total`. Everything else goes to train.
    pub fn allocate(contigs: &[Contig], test: f64, valid: f64, tolerance: f64) -> Result<Self> {
        validate_fractions(test, valid)?;

        let total: u64 = contigs.iter().map(|x| x.len()).sum();
        let slack = tolerance * total as f64;
        let aims = [(Split::Test, test * total as f64), (Split::Valid, valid * total as f64)];

        let mut order = (0..contigs.len()).collect::<Vec<_>>();
        order.sort_by_key(|ind| std::cmp::Reverse(contigs[*ind].len()));

        let mut assigned: [Vec<usize>; 3] = Default::default();
        let mut lengths = [0u64; 3];
        for ind in order {
            let length = contigs[ind].len();
            let split = aims
                .iter()
                .find(|(split, aim)| {
                    let current = lengths[split.ind()] as f64;
                    aim - current > 0.0 && current + length as f64 <= aim + slack
                })
                .map(|(split, _)| *split)
                .unwrap_or(Split::Train);

            assigned[split.ind()].push(ind);
            lengths[split.ind()] += length;
        }
        for contigs in assigned.iter_mut() {
            contigs.sort();
        }

        let allocation = Self {
            assigned,
            lengths,
            total,
        };
        for (split, aim) in [(Split::Test, test), (Split::Valid, valid)] {
            let realized = allocation.fraction(split);
            if (realized - aim).abs() > tolerance {
                return Err(PrepError::SplitInfeasible(format!(
                    "realized {split} fraction {realized:.4} deviates from the requested {aim:.4} \
                     by more than {tolerance}"
                ))
                .into());
            }
        }
        Ok(allocation)
    }

    /// Indices of contigs assigned to the split, in genome order.
    pub fn contigs(&self, split: Split) -> &[usize] {
        &self.assigned[split.ind()]
    }

    /// Number of nucleotides assigned to the split.
    pub fn length(&self, split: Split) -> u64 {
        self.lengths[split.ind()]
    }

    pub fn fraction(&self, split: Split) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.length(split) as f64 / self.total as f64
        }
    }

    /// Human readable report of the allocation.
    pub fn summary(&self) -> String {
        let width = self.total.to_string().len();
        let mut summary = String::from("Contigs divided into");
        for split in Split::ALL {
            let name = format!("{}:", capitalize(split.as_str()));
            // Writing to a String never fails
            let _ = write!(
                summary,
                "\n {:<6} {:>5} contigs, {:>width$} nt ({:.4})",
                name,
                self.contigs(split).len(),
                self.length(split),
                self.fraction(split),
            );
        }
        summary
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gentile_core_rs::loc::Region;

    fn contigs(lengths: &[u64]) -> Vec<Contig> {
        let mut start = 0;
        lengths
            .iter()
            .map(|length| {
                let contig = Contig::new(0, Region::new("chr1", start, start + length).unwrap());
                start += length + 1;
                contig
            })
            .collect()
    }

    #[test]
    fn test_split_parse() -> Result<()> {
        for split in Split::ALL {
            assert_eq!(split.to_string().parse::<Split>()?, split);
        }
        assert!("training".parse::<Split>().is_err());
        Ok(())
    }

    #[test]
    fn test_validate_fractions() {
        assert!(validate_fractions(0.1, 0.1).is_ok());
        assert!(validate_fractions(0.0, 1.0).is_ok());
        for (test, valid) in [(-0.1, 0.1), (0.1, 1.1), (0.6, 0.5)] {
            let err = validate_fractions(test, valid).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PrepError>(),
                Some(PrepError::SplitInfeasible(_))
            ));
        }
    }

    #[test]
    fn test_allocation() -> Result<()> {
        let contigs = contigs(&[200, 100, 200, 200, 200, 200, 100, 200, 200, 200]);
        let allocation = Allocation::allocate(&contigs, 0.1, 0.1, 0.02)?;

        // The first two largest contigs in genome order go to test and valid
        assert_eq!(allocation.contigs(Split::Test), &[0]);
        assert_eq!(allocation.contigs(Split::Valid), &[2]);
        assert_eq!(allocation.contigs(Split::Train), &[1, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(*allocation.total(), 1800);
        assert_eq!(allocation.length(Split::Train), 1400);

        let assigned: usize = Split::ALL
            .iter()
            .map(|x| allocation.contigs(*x).len())
            .sum();
        assert_eq!(assigned, contigs.len());
        Ok(())
    }

    #[test]
    fn test_allocation_is_deterministic() -> Result<()> {
        let contigs = contigs(&[50, 70, 70, 30, 90, 10, 10, 40, 60, 70]);
        let first = Allocation::allocate(&contigs, 0.2, 0.1, 0.05)?;
        let second = Allocation::allocate(&contigs, 0.2, 0.1, 0.05)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_infeasible_allocation() {
        // A single contig can't be shared between splits
        let contigs = contigs(&[1000]);
        let err = Allocation::allocate(&contigs, 0.5, 0.0, 0.02).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PrepError>(),
            Some(PrepError::SplitInfeasible(_))
        ));
    }

    #[test]
    fn test_train_only() -> Result<()> {
        let contigs = contigs(&[10, 20]);
        let allocation = Allocation::allocate(&contigs, 0.0, 0.0, 0.02)?;
        assert_eq!(allocation.contigs(Split::Train), &[0, 1]);
        assert!(allocation.contigs(Split::Test).is_empty());
        Ok(())
    }

    #[test]
    fn test_summary() -> Result<()> {
        let contigs = contigs(&[800, 100, 100]);
        let summary = Allocation::allocate(&contigs, 0.1, 0.1, 0.02)?.summary();
        assert_eq!(
            summary,
            "Contigs divided into\n \
             Train:     1 contigs,  800 nt (0.8000)\n \
             Valid:     1 contigs,  100 nt (0.1000)\n \
             Test:      1 contigs,  100 nt (0.1000)"
        );
        Ok(())
    }
}

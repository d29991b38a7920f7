use std::fmt::{Debug, Display};

use eyre::{ensure, Result};
use serde::{Deserialize, Serialize};

/// T values are primitive integers
pub trait PrimInt: ::num::PrimInt + Debug + Default {}
impl<T: ::num::PrimInt + Debug + Default> PrimInt for T {}

/// A finite number in the closed [0, 1] range, e.g. a share of the genome.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Fraction(f64);

impl Fraction {
    pub const ZERO: Fraction = Fraction(0.0);
    pub const ONE: Fraction = Fraction(1.0);

    pub fn new(value: f64) -> Result<Self> {
        ensure!(
            value.is_finite() && (0.0..=1.0).contains(&value),
            "Fraction must be a finite number within [0, 1], got {value}"
        );
        Ok(Self(value))
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Share of the given total, rounded down.
    pub fn of(&self, total: u64) -> u64 {
        (self.0 * total as f64).floor() as u64
    }
}

impl TryFrom<f64> for Fraction {
    type Error = eyre::Report;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Fraction> for f64 {
    fn from(value: Fraction) -> Self {
        value.0
    }
}

impl Display for Fraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

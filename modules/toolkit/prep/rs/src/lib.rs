pub use config::{Config, ConfigBuilder, DownSample, ShortContigs, Stride, Tail};
pub use error::PrepError;
pub use preparer::{Preparer, Summary};
pub use split::Split;
pub use stats::Statistics;

pub mod binner;
pub mod config;
pub mod contigs;
pub mod dna;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod mappable;
pub mod mask;
mod preparer;
pub mod split;
mod stats;
pub mod tiler;
pub mod writer;

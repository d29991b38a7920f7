pub mod bed;
pub mod bedgraph;
pub mod binned;
pub mod compression;
pub mod fasta;
pub mod records;
pub mod tracks;
mod traits;

pub use traits::{ReadRecord, WriteRecord};

// Format specification: https://samtools.github.io/hts-specs/BEDv1.pdf
//
// Only the leading fields are interpreted:
// 1. seqid: [[:alnum:]_]{1,255}
// 2. start: u64
// 3. end: u64
// 4. name: [\x20-\x7e]{1,255}
//
// `track`, `browser` and `#` lines are headers and skipped by the reader.

mod reader;
mod record;
mod writer;

pub use reader::{parse, Reader};
pub use record::{Bed3, Bed4, BedRecord};
pub use writer::Writer;

mod index;
mod indexed_reader;

pub use index::{FaEntry, FaIndex};
pub use indexed_reader::{IndexedReader, IndexedReaderMutOp};

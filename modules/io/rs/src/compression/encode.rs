use eyre::{bail, Result};
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;

/// Compression of an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Config {
    #[default]
    Plain,
    Gzip(Level),
}

/// DEFLATE compression level in [0, 9].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    pub const FAST: Level = Level(1);
    pub const DEFAULT: Level = Level(6);
    pub const BEST: Level = Level(9);

    pub fn new(level: u8) -> Result<Self> {
        if level > 9 {
            bail!("Invalid DEFLATE compression level: {}", level);
        }
        Ok(Self(level))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::DEFAULT
    }
}

impl Config {
    pub fn infer_from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext {
                "gz" | "gzip" => Config::Gzip(Level::default()),
                _ => Config::Plain,
            })
            .unwrap_or(Config::Plain)
    }
}

pub enum Stream<W: Write> {
    Raw(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Stream<W> {
    pub fn new(inner: W, config: &Config) -> Self {
        match config {
            Config::Plain => Stream::Raw(inner),
            Config::Gzip(level) => Stream::Gzip(GzEncoder::new(
                inner,
                flate2::Compression::new(level.get() as u32),
            )),
        }
    }

    /// Write all pending data (including compression trailers) and return the inner writer.
    pub fn finish(self) -> Result<W> {
        let mut inner = match self {
            Stream::Raw(inner) => inner,
            Stream::Gzip(encoder) => encoder.finish()?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for Stream<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Stream::Raw(w) => w.write(buf),
            Stream::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Raw(w) => w.flush(),
            Stream::Gzip(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::decode;
    use std::io::Read;

    #[test]
    fn test_gzip_stream() -> Result<()> {
        let mut stream = Stream::new(Vec::new(), &Config::Gzip(Level::BEST));
        stream.write_all(b"ACGT\n")?;
        let bytes = stream.finish()?;
        assert_eq!(decode::Config::infer_from_header(&bytes), decode::Config::Gzip);

        let mut decoded = String::new();
        decode::Stream::new(&bytes[..], &decode::Config::Gzip).read_to_string(&mut decoded)?;
        assert_eq!(decoded, "ACGT\n");
        Ok(())
    }

    #[test]
    fn test_infer_from_path() {
        assert_eq!(
            Config::infer_from_path("a.bed.gz"),
            Config::Gzip(Level::DEFAULT)
        );
        assert_eq!(Config::infer_from_path("a.bed"), Config::Plain);
        assert!(Level::new(10).is_err());
    }
}

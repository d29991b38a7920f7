use eyre::{ensure, Result, WrapErr};
use flate2::read::MultiGzDecoder;
use noodles::bgzf;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Compression of an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Config {
    #[default]
    Plain,
    Gzip,
    Bgzf,
}

// gzip member header with FEXTRA set and the 'BC' subfield, see SAM specification 4.1
const BGZF_MAGIC: [u8; 4] = [0x1f, 0x8b, 0x08, 0x04];
const BGZF_SUBFIELD: [u8; 2] = [b'B', b'C'];

impl Config {
    /// Detect the compression from the leading bytes of the stream. BGZF is recognized by its
    /// block header, any other gzip stream is treated as a plain gzip.
    pub fn infer_from_header(header: &[u8]) -> Self {
        match infer::get(header) {
            Some(kind) if kind.mime_type() == "application/gzip" => {
                if header.len() >= 14
                    && header[..4] == BGZF_MAGIC
                    && header[12..14] == BGZF_SUBFIELD
                {
                    Config::Bgzf
                } else {
                    Config::Gzip
                }
            }
            // Always assume plain text if there is no clear match
            _ => Config::Plain,
        }
    }

    pub fn infer_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut header = Vec::with_capacity(18);
        File::open(path)
            .wrap_err_with(|| format!("Failed to open {}", path.display()))?
            .take(18)
            .read_to_end(&mut header)?;
        Ok(Self::infer_from_header(&header))
    }
}

pub enum Stream<R: Read> {
    Raw(R),
    Gzip(MultiGzDecoder<R>),
    Bgzf(bgzf::io::Reader<R>),
}

impl<R: Read> Stream<R> {
    pub fn new(inner: R, config: &Config) -> Self {
        match config {
            Config::Plain => Stream::Raw(inner),
            Config::Gzip => Stream::Gzip(MultiGzDecoder::new(inner)),
            Config::Bgzf => Stream::Bgzf(bgzf::io::Reader::new(inner)),
        }
    }
}

impl<R: Read> Read for Stream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Raw(r) => r.read(buf),
            Stream::Gzip(r) => r.read(buf),
            Stream::Bgzf(r) => r.read(buf),
        }
    }
}

/// Open the file for buffered reading, transparently decompressing gzip and BGZF content.
pub fn open(path: impl AsRef<Path>) -> Result<Box<dyn BufRead + Send + 'static>> {
    let path = path.as_ref();
    ensure!(path.exists(), "File {} does not exist", path.display());

    let config = Config::infer_from_path(path)?;
    let file = File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    let stream: Box<dyn BufRead + Send + 'static> = match Stream::new(file, &config) {
        Stream::Raw(file) => Box::new(BufReader::new(file)),
        Stream::Gzip(gzip) => Box::new(BufReader::new(gzip)),
        Stream::Bgzf(bgzf) => Box::new(bgzf),
    };
    Ok(stream)
}

use crate::compression::decode;
use ahash::HashMap;
use derive_getters::{Dissolve, Getters};
use eyre::{bail, ensure, eyre, Result, WrapErr};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A single line of the samtools FASTA index (`.fai`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Dissolve, Getters)]
pub struct FaEntry {
    name: String,
    // Total length of the reference sequence, in bases
    length: u64,
    // Offset in the FASTA file of the first base of the reference sequence
    offset: u64,
    line_bases: u64,
    // Including line ending character[s]
    line_width: u64,
}

impl FaEntry {
    pub fn new(
        name: String,
        length: u64,
        offset: u64,
        line_bases: u64,
        line_width: u64,
    ) -> Result<Self> {
        ensure!(!name.is_empty(), "Reference sequence name must not be empty");
        ensure!(
            length > 0,
            "Length of the reference sequence {name} must be greater than zero"
        );
        ensure!(
            line_bases > 0,
            "Bases per line must be greater than zero for {name}"
        );
        ensure!(
            line_width > line_bases,
            "Bytes per line must be greater than bases per line for {name}"
        );
        Ok(Self {
            name,
            length,
            offset,
            line_bases,
            line_width,
        })
    }
}

/// FASTA index: reference sequences in the order they appear in the FASTA file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FaIndex {
    entries: Vec<FaEntry>,
    lookup: HashMap<String, usize>,
}

impl FaIndex {
    pub fn new(entries: Vec<FaEntry>) -> Result<Self> {
        let mut lookup = HashMap::default();
        for (ind, entry) in entries.iter().enumerate() {
            if lookup.insert(entry.name.clone(), ind).is_some() {
                bail!(
                    "Duplicated reference sequence in the FASTA index: {}",
                    entry.name
                );
            }
        }
        Ok(Self { entries, lookup })
    }

    /// Parse a `.fai` index.
    pub fn read(mut reader: impl BufRead) -> Result<Self> {
        let mut entries = Vec::new();
        let mut buffer = String::new();
        while reader.read_line(&mut buffer)? > 0 {
            let line = buffer.trim_end_matches(['\r', '\n']);
            if !line.is_empty() {
                entries.push(
                    parse_line(line)
                        .wrap_err_with(|| format!("Invalid FASTA index line: {line}"))?,
                );
            }
            buffer.clear();
        }
        Self::new(entries)
    }

    /// Build the index by scanning an uncompressed FASTA stream.
    /// All sequence lines of a record except the last one must have the same length.
    pub fn scan(mut fasta: impl BufRead) -> Result<Self> {
        struct Current {
            name: String,
            length: u64,
            offset: u64,
            line_bases: u64,
            line_width: u64,
            closed: bool,
        }

        fn finish(current: Option<Current>, entries: &mut Vec<FaEntry>) -> Result<()> {
            if let Some(x) = current {
                entries.push(FaEntry::new(
                    x.name,
                    x.length,
                    x.offset,
                    x.line_bases,
                    x.line_width,
                )?);
            }
            Ok(())
        }

        let mut entries = Vec::new();
        let mut current: Option<Current> = None;
        let mut position = 0u64;
        let mut line = Vec::new();
        loop {
            line.clear();
            let width = fasta.read_until(b'\n', &mut line)? as u64;
            if width == 0 {
                break;
            }
            position += width;

            let content = line.strip_suffix(b"\n").unwrap_or(&line);
            let content = content.strip_suffix(b"\r").unwrap_or(content);
            let bases = content.len() as u64;

            if let Some(header) = content.strip_prefix(b">") {
                finish(current.take(), &mut entries)?;
                let name = String::from_utf8_lossy(header)
                    .split_whitespace()
                    .next()
                    .map(|x| x.to_owned())
                    .ok_or_else(|| eyre!("FASTA header without a name at byte {position}"))?;
                current = Some(Current {
                    name,
                    length: 0,
                    offset: position,
                    line_bases: 0,
                    line_width: 0,
                    closed: false,
                });
                continue;
            }

            let Some(record) = current.as_mut() else {
                ensure!(bases == 0, "FASTA sequence before the first header");
                continue;
            };
            if bases == 0 {
                record.closed = true;
                continue;
            }
            ensure!(
                !record.closed,
                "Sequence lines of {} have different lengths, the FASTA can't be indexed",
                record.name
            );

            if record.line_bases == 0 {
                record.line_bases = bases;
                record.line_width = width;
            } else if bases != record.line_bases || width != record.line_width {
                ensure!(
                    bases < record.line_bases,
                    "Sequence lines of {} have different lengths, the FASTA can't be indexed",
                    record.name
                );
                record.closed = true;
            }
            record.length += bases;
        }
        finish(current, &mut entries)?;
        Self::new(entries)
    }

    /// Index of the given FASTA file: `{fasta}.fai` when present, otherwise built by scanning the
    /// (uncompressed) FASTA itself.
    pub fn load(fasta: impl AsRef<Path>) -> Result<Self> {
        let fasta = fasta.as_ref();
        let fai = Self::fai_path(fasta);
        if fai.exists() {
            let file = File::open(&fai)
                .wrap_err_with(|| format!("Failed to open FASTA index {}", fai.display()))?;
            return Self::read(BufReader::new(file))
                .wrap_err_with(|| format!("Failed to parse FASTA index {}", fai.display()));
        }

        let compression = decode::Config::infer_from_path(fasta)?;
        ensure!(
            compression == decode::Config::Plain,
            "FASTA index {} does not exist, compressed FASTA files must be indexed",
            fai.display()
        );
        log::info!(
            "FASTA index {} not found, indexing {}",
            fai.display(),
            fasta.display()
        );
        let file = File::open(fasta)
            .wrap_err_with(|| format!("Failed to open FASTA {}", fasta.display()))?;
        Self::scan(BufReader::new(file))
            .wrap_err_with(|| format!("Failed to index FASTA {}", fasta.display()))
    }

    pub fn fai_path(fasta: &Path) -> PathBuf {
        let mut path = fasta.as_os_str().to_owned();
        path.push(".fai");
        PathBuf::from(path)
    }

    pub fn get(&self, name: &str) -> Option<&FaEntry> {
        self.lookup.get(name).map(|ind| &self.entries[*ind])
    }

    pub fn entries(&self) -> &[FaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str) -> Result<FaEntry> {
    let mut parts = line.split('\t');
    let mut next = |field: &str| {
        parts
            .next()
            .ok_or_else(|| eyre!("Missing {field}"))
            .map(|x| x.to_owned())
    };

    let name = next("sequence name")?;
    let length = next("length")?.parse::<u64>()?;
    let offset = next("offset")?.parse::<u64>()?;
    let line_bases = next("line bases")?.parse::<u64>()?;
    let line_width = next("line width")?.parse::<u64>()?;
    ensure!(parts.next().is_none(), "Extra fields in the FASTA index");

    FaEntry::new(name, length, offset, line_bases, line_width)
}

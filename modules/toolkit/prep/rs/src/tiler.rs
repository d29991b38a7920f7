use crate::config::Tail;
use crate::contigs::Contig;
use crate::error::PrepError;
use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use eyre::{ensure, Result};
use gentile_core_rs::loc::Region;
use gentile_core_rs::num::Fraction;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A fixed-length window of a contig.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Getters, Dissolve, Constructor)]
pub struct Window {
    // Index of the source contig
    contig: usize,
    region: Region,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiler {
    length: u64,
    stride: u64,
    snap: Option<u64>,
    tail: Tail,
}

impl Tiler {
    pub fn new(length: u64, stride: u64, snap: Option<u64>, tail: Tail) -> Result<Self> {
        ensure!(length > 0, "Window length must be positive");
        ensure!(stride > 0, "Stride must be positive");
        ensure!(snap != Some(0), "Snap must be positive");
        Ok(Self {
            length,
            stride,
            snap,
            tail,
        })
    }

    /// Lazily tile the contig with windows. Calling it again yields the same windows.
    pub fn tile<'a>(&self, index: usize, contig: &'a Contig) -> Result<Tiles<'a>> {
        if contig.len() < self.length {
            return Err(PrepError::InsufficientContig(format!(
                "{} is shorter than the window length {}",
                contig.region(),
                self.length
            ))
            .into());
        }

        let start = match self.snap {
            Some(snap) => contig.start().div_ceil(snap) * snap,
            None => contig.start(),
        };
        Ok(Tiles {
            tiler: *self,
            index,
            contig,
            next: start,
            last_end: None,
            finished: false,
        })
    }
}

pub struct Tiles<'a> {
    tiler: Tiler,
    index: usize,
    contig: &'a Contig,
    next: u64,
    last_end: Option<u64>,
    finished: bool,
}

impl Tiles<'_> {
    fn window(&self, start: u64) -> Option<Window> {
        // Bounds were checked by the tiler, the region is always valid
        Region::new(self.contig.seqid(), start, start + self.tiler.length)
            .ok()
            .map(|region| Window::new(self.index, region))
    }
}

impl Iterator for Tiles<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let end = self.contig.end();
        if self.next + self.tiler.length <= end {
            let window = self.window(self.next);
            self.last_end = Some(self.next + self.tiler.length);
            self.next += self.tiler.stride;
            return window;
        }

        self.finished = true;
        match (self.tiler.tail, self.last_end) {
            (Tail::Pad, Some(last_end)) if last_end < end => self.window(end - self.tiler.length),
            (Tail::Pad, None) => self.window(end - self.tiler.length),
            _ => None,
        }
    }
}

/// Keep `floor(fraction × n)` randomly chosen windows, preserving their order.
pub fn sample_windows(windows: Vec<Window>, fraction: Fraction, seed: u64) -> Vec<Window> {
    let amount = fraction.of(windows.len() as u64) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut selected = rand::seq::index::sample(&mut rng, windows.len(), amount).into_vec();
    selected.sort_unstable();

    let mut selected = selected.into_iter().peekable();
    windows
        .into_iter()
        .enumerate()
        .filter_map(|(ind, window)| {
            if selected.peek() == Some(&ind) {
                selected.next();
                Some(window)
            } else {
                None
            }
        })
        .collect()
}

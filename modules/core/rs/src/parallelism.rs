use std::cmp::Ordering;
use std::thread::available_parallelism;

use eyre::{Result, WrapErr};
use rayon::{ThreadPool, ThreadPoolBuilder};

fn _normalize(requested: isize, max: isize) -> usize {
    match requested.cmp(&0) {
        Ordering::Less => (max + requested + 1).max(1) as usize,
        Ordering::Equal => 1,
        Ordering::Greater => requested.min(max) as usize,
    }
}

/// Number of threads to use for the requested amount. Positive values are capped by the number of
/// available cores, negative values count back from it (-1 = all cores, -2 = all but one, etc.).
pub fn available(requested: isize) -> Result<usize> {
    let max = available_parallelism()?.get() as isize;
    Ok(_normalize(requested, max))
}

/// Dedicated thread pool with the number of threads resolved by [available].
pub fn pool(requested: isize, name: &'static str) -> Result<ThreadPool> {
    let threads = available(requested)?;
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |ind| format!("{name}-{ind}"))
        .build()
        .wrap_err_with(|| format!("Failed to build a thread pool with {threads} threads"))
}

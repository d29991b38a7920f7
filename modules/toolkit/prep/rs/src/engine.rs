use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use eyre::{Report, Result};
use rayon::ThreadPool;

use gentile_core_rs::parallelism;

/// An independent unit of work with a fixed set of output files.
pub trait Job: Send + Sync {
    fn name(&self) -> String;

    /// Final files produced by a successful run.
    fn outputs(&self) -> Vec<PathBuf>;

    fn run(&self) -> Result<()>;

    /// Remove everything a failed run might have left behind.
    fn cleanup(&self) {
        for output in self.outputs() {
            for path in [staging(&output), output] {
                if path.exists() {
                    if let Err(err) = std::fs::remove_file(&path) {
                        log::warn!("Failed to remove {}: {err}", path.display());
                    }
                }
            }
        }
    }

    fn is_done(&self) -> bool {
        self.outputs().iter().all(|x| x.exists())
    }
}

/// Temporary path used while the output is being written.
pub fn staging(output: &Path) -> PathBuf {
    let mut path = OsString::from(output.as_os_str());
    path.push(".tmp");
    PathBuf::from(path)
}

/// Move a complete temporary file to its final location.
pub fn commit(output: &Path) -> Result<()> {
    std::fs::rename(staging(output), output)?;
    Ok(())
}

pub struct Engine {
    pool: ThreadPool,
    restart: bool,
}

impl Engine {
    pub fn new(processes: isize, restart: bool) -> Result<Self> {
        Ok(Self {
            pool: parallelism::pool(processes, "gentile")?,
            restart,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Execute all jobs (started in the submission order) and return the number of jobs that were
    /// actually run. Once a job fails, jobs that haven't started yet are skipped and the error of
    /// the earliest failed job is returned.
    pub fn run<J: Job>(&self, stage: &str, jobs: &[J]) -> Result<usize> {
        let has_failed = AtomicBool::new(false);
        let executed = AtomicUsize::new(0);
        let errors: Mutex<Vec<(usize, Report)>> = Mutex::new(Vec::new());

        log::info!("{stage}: {} jobs on {} threads", jobs.len(), self.threads());
        self.pool.scope_fifo(|s| {
            for (ind, job) in jobs.iter().enumerate() {
                if has_failed.load(Ordering::Relaxed) {
                    return;
                }
                if self.restart && job.is_done() {
                    log::info!("{stage}: {} is already done, skipping", job.name());
                    continue;
                }

                let (has_failed, executed, errors) = (&has_failed, &executed, &errors);
                s.spawn_fifo(move |_| {
                    if has_failed.load(Ordering::Relaxed) {
                        return;
                    }

                    log::debug!("{stage}: started {}", job.name());
                    match job.run() {
                        Ok(()) => {
                            executed.fetch_add(1, Ordering::Relaxed);
                            log::debug!("{stage}: finished {}", job.name());
                        }
                        Err(err) => {
                            has_failed.store(true, Ordering::Relaxed);
                            job.cleanup();
                            log::error!("{stage}: {} failed: {err:?}", job.name());
                            errors
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push((ind, err));
                        }
                    }
                });
            }
        });

        let mut errors = errors.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(first) = (0..errors.len()).min_by_key(|x| errors[*x].0) {
            let (_, err) = errors.swap_remove(first);
            return Err(err);
        }
        Ok(executed.into_inner())
    }
}

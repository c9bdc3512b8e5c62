//! Batch evaluation over a directory of document images.
//!
//! Recognition is embarrassingly parallel at the image level: each worker
//! thread runs its own full pipeline instance and shares nothing mutable
//! (the rule tables are read-only statics). A shared stop flag cancels the
//! batch by ceasing dispatch of new images; in-flight recognitions run to
//! completion. Per-file failures are classified in the summary and never
//! abort the run.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::models::MrzRecord;
use crate::processing::OcrConfig;
use crate::reader::{MrzReader, ReadOptions};
use crate::utils::MrzError;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Number of worker threads.
    pub jobs: usize,
    /// Only process the first N files.
    pub limit: Option<usize>,
    pub ocr: OcrConfig,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            jobs: 1,
            limit: None,
            ocr: OcrConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Recognized(Box<MrzRecord>),
    NoMrz,
    /// Infrastructure failure for this file (unreadable image, engine error).
    Failed(String),
}

#[derive(Debug)]
pub struct FileResult {
    pub path: PathBuf,
    pub outcome: FileOutcome,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<FileResult>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn recognized(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FileOutcome::Recognized(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FileOutcome::Failed(_)))
            .count()
    }

    /// Fraction of processed files with a recognized MRZ.
    pub fn success_rate(&self) -> f32 {
        if self.results.is_empty() {
            0.0
        } else {
            self.recognized() as f32 / self.total() as f32
        }
    }
}

pub struct BatchRunner {
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(options: BatchOptions) -> Self {
        BatchRunner { options }
    }

    /// Evaluates every regular file in `dir`, sorted by name.
    pub fn run_dir(&self, dir: &Path, cancel: &AtomicBool) -> Result<BatchSummary, MrzError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        if let Some(limit) = self.options.limit {
            files.truncate(limit);
        }
        Ok(self.run_files(files, cancel))
    }

    /// Runs the pipeline over the given files with a fixed worker pool.
    pub fn run_files(&self, files: Vec<PathBuf>, cancel: &AtomicBool) -> BatchSummary {
        let total = files.len();
        let queue: Mutex<VecDeque<PathBuf>> = Mutex::new(files.into());
        let (tx, rx) = mpsc::channel::<FileResult>();
        let jobs = self.options.jobs.max(1);
        info!("evaluating {} file(s) on {} worker(s)", total, jobs);

        thread::scope(|scope| {
            for _ in 0..jobs {
                let tx = tx.clone();
                let queue = &queue;
                let ocr = self.options.ocr.clone();
                scope.spawn(move || {
                    let reader = MrzReader::with_options(ReadOptions {
                        save_roi: false,
                        ocr,
                    });
                    loop {
                        if cancel.load(Ordering::Relaxed) {
                            return;
                        }
                        let Some(path) = queue.lock().unwrap().pop_front() else {
                            return;
                        };
                        let started = Instant::now();
                        let outcome = match reader.read_path(&path) {
                            Ok(Some(record)) => FileOutcome::Recognized(Box::new(record)),
                            Ok(None) => FileOutcome::NoMrz,
                            Err(err) => {
                                warn!("{}: {}", path.display(), err);
                                FileOutcome::Failed(err.to_string())
                            }
                        };
                        let _ = tx.send(FileResult {
                            path,
                            outcome,
                            elapsed: started.elapsed(),
                        });
                    }
                });
            }
            drop(tx);
        });

        let mut summary = BatchSummary {
            results: rx.into_iter().collect(),
        };
        summary.results.sort_by(|a, b| a.path.cmp(&b.path));
        summary
    }
}

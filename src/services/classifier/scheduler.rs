use crate::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use tracing::debug;

/// Shared stop flag, polled before each batch and between completions.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receives per-task outcomes on the thread that called `BatchScheduler::run`.
pub trait BatchObserver<R, E> {
    fn on_result(&mut self, result: R);
    fn on_error(&mut self, error: E);
    fn on_progress(&mut self, processed: usize, total: usize);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub batches_started: usize,
    pub cancelled: bool,
}

/// Number of batches `total` tasks split into.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size.max(1))
}

pub struct BatchScheduler {
    batch_size: usize,
    max_workers: usize,
}

enum Completion<R, E> {
    Done(Result<R, E>),
    Skipped,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, max_workers: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_workers: max_workers.max(1),
        }
    }

    /// Run `work` over `tasks` in consecutive batches. Each batch is fully
    /// drained (or abandoned on cancel) before the next one is submitted.
    /// Failed tasks still count as processed.
    pub fn run<T, R, E, F, O>(
        &self,
        tasks: &[T],
        work: F,
        cancel: &CancelToken,
        observer: &mut O,
    ) -> Result<BatchReport, AppError>
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(&T) -> Result<R, E> + Sync,
        O: BatchObserver<R, E>,
    {
        let mut report = BatchReport {
            total: tasks.len(),
            ..Default::default()
        };
        if tasks.is_empty() {
            return Ok(report);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .thread_name(|i| format!("classify-worker-{}", i))
            .build()
            .map_err(|e| AppError::WorkerPool(e.to_string()))?;

        for (batch_index, batch) in tasks.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.batches_started += 1;
            debug!(
                "Starting batch {}/{} ({} images)",
                batch_index + 1,
                batch_count(tasks.len(), self.batch_size),
                batch.len()
            );

            let (tx, rx) = mpsc::channel::<Completion<R, E>>();
            let work = &work;

            let stopped = pool.in_place_scope(|scope| {
                for task in batch {
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let completion = if cancel.is_cancelled() {
                            Completion::Skipped
                        } else {
                            Completion::Done(work(task))
                        };
                        let _ = tx.send(completion);
                    });
                }
                drop(tx);

                for completion in rx.iter() {
                    if cancel.is_cancelled() {
                        return true;
                    }
                    match completion {
                        Completion::Done(Ok(result)) => observer.on_result(result),
                        Completion::Done(Err(error)) => observer.on_error(error),
                        Completion::Skipped => continue,
                    }
                    report.processed += 1;
                    observer.on_progress(report.processed, report.total);
                }
                false
            });

            if stopped {
                report.cancelled = true;
                break;
            }
        }

        Ok(report)
    }
}

//! Fixed-size worker pool shared by every gap phase of an engine.
//!
//! Workers pull boxed jobs from one `crossbeam` channel. Each job reports its
//! outcome through its own bounded channel, so a caller can wait on exactly
//! the tasks it dispatched. A job that is dropped without running (after a
//! forced shutdown) disconnects its channel, which the waiting side observes
//! as an error rather than a hang.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, warn};

use crate::config::SHUTDOWN_GRACE;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShutdownReport {
    /// Every worker drained the queue and exited within the grace period.
    Graceful,
    /// Queued jobs were discarded and `stragglers` threads were detached.
    Forced { stragglers: usize },
    AlreadyShutDown,
}

/// Completion handle for one queued job.
#[must_use = "a task handle must be joined before the data it borrows is reused"]
pub struct TaskHandle {
    done: Receiver<Result<()>>,
}

impl TaskHandle {
    /// Blocks until the job finished or was dropped without running.
    pub fn join(self) -> Result<()> {
        match self.done.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(anyhow!("worker task dropped before completion")),
        }
    }
}

struct Worker {
    id: usize,
    handle: JoinHandle<()>,
}

pub struct WorkerPool {
    injector: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<Worker>>,
    exited: Receiver<usize>,
    abort: Arc<AtomicBool>,
    size: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            bail!("worker pool needs at least one worker");
        }

        let (job_tx, job_rx) = channel::unbounded::<Job>();
        let (exit_tx, exit_rx) = channel::unbounded::<usize>();
        let abort = Arc::new(AtomicBool::new(false));

        let mut spawned = Vec::with_capacity(workers);
        for id in 0..workers {
            let jobs = job_rx.clone();
            let exited = exit_tx.clone();
            let abort = Arc::clone(&abort);
            let handle = thread::Builder::new()
                .name(format!("shell-sort-worker-{id}"))
                .spawn(move || worker_loop(id, jobs, abort, exited))
                .with_context(|| format!("failed to spawn worker thread {id}"))?;
            spawned.push(Worker { id, handle });
        }
        debug!(workers, "worker pool started");

        Ok(Self {
            injector: Mutex::new(Some(job_tx)),
            workers: Mutex::new(spawned),
            exited: exit_rx,
            abort,
            size: workers,
        })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.size
    }

    pub fn is_shut_down(&self) -> bool {
        self.injector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Queues `job`. A panic inside the job is caught and reported through
    /// the returned handle; the worker thread keeps serving the queue.
    pub fn execute<F>(&self, job: F) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = channel::bounded(1);
        let wrapped: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| anyhow!("worker task panicked: {}", panic_message(&*payload)));
            let _ = done_tx.send(outcome);
        });

        let injector = self.injector.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = injector.as_ref() else {
            bail!("worker pool is shut down");
        };
        sender
            .send(wrapped)
            .map_err(|_| anyhow!("worker pool is shut down"))?;
        Ok(TaskHandle { done: done_rx })
    }

    /// Stops accepting jobs, waits up to `grace` for the queue to drain, then
    /// discards whatever is still queued and detaches busy workers.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let Some(sender) = self
            .injector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return ShutdownReport::AlreadyShutDown;
        };
        drop(sender);

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let deadline = Instant::now() + grace;
        let mut finished = HashSet::with_capacity(workers.len());
        while finished.len() < workers.len() {
            match self.exited.recv_deadline(deadline) {
                Ok(id) => {
                    finished.insert(id);
                }
                Err(_) => break,
            }
        }

        let stragglers = workers.len() - finished.len();
        if stragglers > 0 {
            self.abort.store(true, Ordering::Release);
        }
        for worker in workers {
            if finished.contains(&worker.id) && worker.handle.join().is_err() {
                warn!(worker = worker.id, "worker thread panicked outside a task");
            }
        }

        if stragglers == 0 {
            debug!(workers = self.size, "worker pool shut down");
            ShutdownReport::Graceful
        } else {
            warn!(
                stragglers,
                grace_ms = grace.as_millis() as u64,
                "worker pool shutdown timed out; detaching busy workers"
            );
            ShutdownReport::Forced { stragglers }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(SHUTDOWN_GRACE);
    }
}

fn worker_loop(id: usize, jobs: Receiver<Job>, abort: Arc<AtomicBool>, exited: Sender<usize>) {
    while let Ok(job) = jobs.recv() {
        if abort.load(Ordering::Acquire) {
            drop(job);
            continue;
        }
        job();
    }
    let _ = exited.send(id);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

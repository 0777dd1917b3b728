// src/batch/pool.rs
// =============================================================================
// This module runs a batch of URLs through a fixed number of workers.
//
// How it works:
// 1. A producer walks the input (lazily, one URL at a time), numbers each URL
//    and pushes it onto a bounded task queue
// 2. N workers pull tasks off the queue. Each one normalizes the URL, fetches
//    the page, scans it and sends a ResultRecord to the aggregator
// 3. When the input runs out the queue closes, the workers exit, the result
//    channel closes and the aggregator puts everything back in input order
//
//   input --> [producer] --> task queue --> worker 1..N --> results --> [aggregator]
//
// One failing URL only ever fails its own task. A panic while processing a
// task is caught and recorded as that task's failure, and the worker moves on
// to the next one.
//
// There is no batch-level cancellation: every task runs until it succeeds,
// fails or hits the fetch timeout.
// =============================================================================

use super::aggregate::{assemble, collect_results, BatchReport};
use super::task::{ErrorKind, Outcome, ResultRecord, Task};
use crate::extract::{normalize_url, scan_page};
use crate::fetch::PageSource;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

// The task queue, shared by all workers of a batch
type TaskQueue = Arc<Mutex<Receiver<Task>>>;

pub const DEFAULT_WORKERS: usize = 15;

// Worker pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers (at least 1)
    pub workers: usize,
    /// How many tasks may wait in the queue before the producer blocks
    pub queue_capacity: usize,
}

impl PoolConfig {
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers * 2,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }
}

pub struct WorkerPool {
    config: PoolConfig,
    source: Arc<dyn PageSource>,
    span: Span,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, source: Arc<dyn PageSource>) -> Self {
        Self {
            config,
            source,
            span: info_span!("batch"),
        }
    }

    // Sets the span every worker logs under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    // Runs one batch and waits until every task has a result
    //
    // The input is consumed lazily on a blocking thread, so it can be backed
    // by a file that's read line by line
    pub async fn run<I>(&self, urls: I) -> BatchReport
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let workers = self.config.workers.max(1);
        let (task_tx, task_rx) = mpsc::channel::<Task>(self.config.queue_capacity.max(1));
        let (result_tx, result_rx) = mpsc::unbounded_channel::<ResultRecord>();
        let queue: TaskQueue = Arc::new(Mutex::new(task_rx));

        // Number the input and feed the queue from a blocking thread
        let urls = urls.into_iter();
        let producer = tokio::task::spawn_blocking(move || {
            let mut submitted = 0;
            for (position, url) in urls.enumerate() {
                // Only fails if every worker is gone
                if task_tx.blocking_send(Task { position, url }).is_err() {
                    break;
                }
                submitted += 1;
            }
            submitted
        });

        // Start the workers, each under its own child span
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let span = info_span!(parent: &self.span, "worker", id);
                tokio::spawn(
                    worker_loop(Arc::clone(&queue), result_tx.clone(), Arc::clone(&self.source))
                        .instrument(span),
                )
            })
            .collect();

        // The result channel closes once the last worker drops its sender
        drop(result_tx);
        drop(queue);

        // Drain results while the producer is still pushing
        let records = collect_results(result_rx).instrument(self.span.clone()).await;

        let submitted = match producer.await {
            Ok(submitted) => submitted,
            Err(e) => {
                self.span.in_scope(|| error!(error = %e, "Task producer failed"));
                records.len()
            }
        };

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                self.span.in_scope(|| warn!(error = %e, "Worker exited abnormally"));
            }
        }

        // Put everything back in input order
        let report = assemble(submitted, records);
        self.span.in_scope(|| {
            info!(
                tasks = report.len(),
                failed = report.failed(),
                workers,
                "Batch finished"
            )
        });
        report
    }
}

// Pops tasks until the queue is closed and empty
async fn worker_loop(queue: TaskQueue, results: UnboundedSender<ResultRecord>, source: Arc<dyn PageSource>) {
    loop {
        // The lock is only held while waiting for the next task
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let span = info_span!("task", position = task.position, url = %task.url);
        let completion = Completion::new(&task, &results);

        // A panic fails this task only; the worker keeps pulling
        let processing = process_task(source.as_ref(), &task).instrument(span.clone());
        let outcome = match AssertUnwindSafe(processing).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                span.in_scope(|| error!(reason = %reason, "Task panicked"));
                Outcome::failure(
                    ErrorKind::WorkerPanicked,
                    format!("worker panicked while processing this task: {}", reason),
                )
            }
        };
        completion.record(outcome);
    }

    debug!("Queue drained, worker exiting");
}

// panic!("...") carries a &str or a String; anything else has no message
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// Normalize -> fetch -> scan, for one task
async fn process_task(source: &dyn PageSource, task: &Task) -> Outcome {
    let url = match normalize_url(&task.url) {
        Ok(url) => url,
        Err(e) => {
            warn!(kind = %ErrorKind::InvalidUrl, error = %e, "Skipping input");
            return Outcome::from(e);
        }
    };

    match source.fetch(&url).await {
        Ok(page) => {
            let report = scan_page(&page.body, page.content_type.as_deref(), Some(&page.final_url));
            info!(
                status = page.status,
                redirects = page.redirects.len(),
                handles = report.handles.len(),
                links = report.links_seen,
                "Page scanned"
            );
            Outcome::Success {
                handles: report.handles,
                status: page.status,
                redirects: page.redirects,
            }
        }
        Err(e) => {
            warn!(
                kind = %ErrorKind::from(&e),
                status = e.status(),
                hint = e.hint(),
                error = %e,
                "Fetch failed"
            );
            Outcome::from(&e)
        }
    }
}

// Records exactly one result for a task
//
// If record() is never reached (the worker task is aborted or a panic slips
// past catch_unwind), the drop sends a WorkerPanicked failure instead
struct Completion<'a> {
    position: usize,
    url: String,
    results: &'a UnboundedSender<ResultRecord>,
    recorded: bool,
}

impl<'a> Completion<'a> {
    fn new(task: &Task, results: &'a UnboundedSender<ResultRecord>) -> Self {
        Self {
            position: task.position,
            url: task.url.clone(),
            results,
            recorded: false,
        }
    }

    fn record(mut self, outcome: Outcome) {
        self.send(outcome);
        self.recorded = true;
    }

    fn send(&self, outcome: Outcome) {
        let record = ResultRecord {
            position: self.position,
            url: self.url.clone(),
            outcome,
        };
        // The aggregator outlives every worker, so this only fails if the
        // whole batch is being torn down
        if self.results.send(record).is_err() {
            error!(position = self.position, "Result channel closed");
        }
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            error!(position = self.position, url = %self.url, "Worker stopped before recording a result");
            self.send(Outcome::failure(
                ErrorKind::WorkerPanicked,
                "worker stopped before recording a result",
            ));
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Arc<Mutex<Receiver>>?
//    - tokio's mpsc channel has many senders but only ONE receiver
//    - To let N workers pop from the same queue, they share the receiver
//    - Arc = shared ownership across tasks, Mutex = one worker pops at a time
//
// 2. What does spawn_blocking do?
//    - Runs a closure on a thread where blocking is allowed
//    - Reading a file line by line blocks, so the producer lives there
//    - blocking_send() waits when the queue is full, which keeps memory flat
//
// 3. How does the batch know it's done?
//    - Every worker holds a clone of the result sender
//    - A worker exits when the queue is closed and empty, dropping its clone
//    - When the last clone is dropped, recv() returns None
//
// 4. What is catch_unwind?
//    - Turns a panic inside a future into an Err instead of killing the task
//    - AssertUnwindSafe promises the compiler we won't reuse broken state
//      (process_task shares nothing mutable, so there is none)
//
// 5. What is Drop?
//    - Code that runs when a value goes out of scope, even during a panic
//    - Completion uses it so a task is never left without a result
//
// 6. What is .instrument(span)?
//    - Attaches a tracing span to a future
//    - Every log line inside it carries the span's fields (worker id, url)
// -----------------------------------------------------------------------------

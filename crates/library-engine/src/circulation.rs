//! Circulation Desk (C14)
//!
//! A bounded background queue that batches the librarian's (C13) work into
//! three job kinds: extraction, compendium, and reorganization. A single
//! background task drains the queue, so "single consumer" holds by
//! construction rather than by a per-topic lock. Handler failures are
//! logged and the job dropped; there is no retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::volume::Volume;

/// One unit of background librarian work.
#[derive(Debug, Clone)]
pub enum Job {
    /// A raw conversation turn to run through `extract`.
    Extraction { turn: String },
    /// Volumes under a topic to run through `summarize`.
    Compendium {
        topic: String,
        volumes: Vec<Volume>,
    },
    /// A topic to run through `reorganize`.
    Reorganization {
        topic: String,
        volumes: Vec<Volume>,
    },
}

/// Handles one dequeued job, applying whatever the host does with the
/// librarian's result (e.g. writing extracted memories back through
/// [`crate::stacks::Stacks::add`]). Returning `Err` only controls logging;
/// the job is dropped either way.
pub trait JobHandler: Send + Sync {
    fn handle(&self, job: Job) -> impl std::future::Future<Output = Result<(), String>> + Send;
}

const DEFAULT_CAPACITY: usize = 256;

/// The background queue itself. Enqueue endpoints apply channel
/// backpressure (they await if the bounded buffer is full); `drain`,
/// `flush`, and `dispose` are the only operations that wait on the worker.
pub struct Circulation {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    enqueued: Arc<AtomicU64>,
    processed: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl Circulation {
    pub fn new<H>(handler: H) -> Self
    where
        H: JobHandler + 'static,
    {
        Self::with_capacity(handler, DEFAULT_CAPACITY)
    }

    pub fn with_capacity<H>(handler: H, capacity: usize) -> Self
    where
        H: JobHandler + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let processed = Arc::new(AtomicU64::new(0));
        let idle = Arc::new(Notify::new());
        let worker = tokio::spawn(run_worker(
            handler,
            receiver,
            Arc::clone(&processed),
            Arc::clone(&idle),
        ));
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            enqueued: Arc::new(AtomicU64::new(0)),
            processed,
            idle,
        }
    }

    pub async fn enqueue_extraction(&self, turn: String) {
        self.send(Job::Extraction { turn }).await;
    }

    pub async fn enqueue_compendium(&self, topic: String, volumes: Vec<Volume>) {
        self.send(Job::Compendium { topic, volumes }).await;
    }

    pub async fn enqueue_reorganization(&self, topic: String, volumes: Vec<Volume>) {
        self.send(Job::Reorganization { topic, volumes }).await;
    }

    async fn send(&self, job: Job) {
        let sender = self.sender.lock().await.clone();
        match sender {
            Some(tx) => {
                self.enqueued.fetch_add(1, Ordering::SeqCst);
                if tx.send(job).await.is_err() {
                    // Worker already gone; count it processed so drain/flush
                    // callers waiting on this job don't hang forever.
                    self.processed.fetch_add(1, Ordering::SeqCst);
                    self.idle.notify_waiters();
                }
            }
            None => warn!("circulation desk is disposed, dropping job"),
        }
    }

    /// Block until the queue is empty and nothing is in flight, including
    /// jobs enqueued while this call is waiting.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            if self.processed.load(Ordering::SeqCst) >= self.enqueued.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Block until every job enqueued as of this call has been processed.
    /// Unlike `drain`, jobs enqueued after this call don't extend the wait.
    pub async fn flush(&self) {
        let target = self.enqueued.load(Ordering::SeqCst);
        loop {
            let notified = self.idle.notified();
            if self.processed.load(Ordering::SeqCst) >= target {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting new jobs, let the worker finish what's already queued,
    /// then join it.
    pub async fn dispose(&self) {
        let sender = self.sender.lock().await.take();
        drop(sender);
        let worker = self.worker.lock().await.take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
    }
}

async fn run_worker<H: JobHandler>(
    handler: H,
    mut receiver: mpsc::Receiver<Job>,
    processed: Arc<AtomicU64>,
    idle: Arc<Notify>,
) {
    while let Some(job) = receiver.recv().await {
        if let Err(err) = handler.handle(job).await {
            warn!(error = %err, "circulation desk job failed, dropping");
        }
        processed.fetch_add(1, Ordering::SeqCst);
        idle.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingHandler {
        seen: Arc<StdMutex<Vec<Job>>>,
    }

    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: Job) -> Result<(), String> {
            self.seen.lock().unwrap().push(job);
            Ok(())
        }
    }

    struct AlwaysFailsHandler {
        calls: Arc<AtomicU64>,
    }

    impl JobHandler for AlwaysFailsHandler {
        async fn handle(&self, _job: Job) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_string())
        }
    }

    #[tokio::test]
    async fn drain_waits_for_all_enqueued_jobs() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let circulation = Circulation::new(RecordingHandler {
            seen: Arc::clone(&seen),
        });
        circulation.enqueue_extraction("turn one".to_string()).await;
        circulation
            .enqueue_compendium("rust".to_string(), Vec::new())
            .await;
        circulation.drain().await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn flush_waits_only_for_jobs_enqueued_before_the_call() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let circulation = Circulation::new(RecordingHandler {
            seen: Arc::clone(&seen),
        });
        circulation.enqueue_extraction("turn one".to_string()).await;
        circulation.flush().await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_the_queue() {
        let calls = Arc::new(AtomicU64::new(0));
        let circulation = Circulation::new(AlwaysFailsHandler {
            calls: Arc::clone(&calls),
        });
        circulation.enqueue_extraction("a".to_string()).await;
        circulation.enqueue_extraction("b".to_string()).await;
        circulation.drain().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dispose_joins_the_worker_and_stops_accepting_jobs() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let circulation = Circulation::new(RecordingHandler {
            seen: Arc::clone(&seen),
        });
        circulation.enqueue_extraction("a".to_string()).await;
        circulation.dispose().await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        // Further enqueues after dispose are silently dropped, not panics.
        circulation.enqueue_extraction("b".to_string()).await;
    }
}

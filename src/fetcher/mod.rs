//! Bounded-concurrency image fetcher with drain-on-close.
//!
//! [`Fetcher::submit`] registers a task and returns immediately; the download
//! runs on the tokio runtime once one of `max_concurrent_downloads` transport
//! slots frees up. Every task reaches exactly one terminal outcome (completed,
//! failed or cancelled), which is logged, recorded in the [`FetchReport`] and
//! broadcast as a [`FetchEvent`].
//!
//! Outstanding tasks live in a registry keyed by [`FetchId`], each with a
//! completion latch. [`Fetcher::await_idle`] waits on a snapshot of those latches;
//! [`Fetcher::close`] additionally waits for the worker tasks themselves via a
//! `TaskTracker` before the transport is released.

mod transport;

pub use transport::{HttpTransport, Transport};

use crate::config::FetchConfig;
use crate::error::{DownloadError, Result};
use crate::sanitize::image_file_name;
use crate::types::{FetchEvent, FetchId, FetchOutcome, FetchReport, FetchStage, FetchTask};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Fires once when a task reaches a terminal state; waiting after that returns at once
#[derive(Clone, Default)]
struct CompletionLatch(CancellationToken);

impl CompletionLatch {
    fn fire(&self) {
        self.0.cancel();
    }

    async fn wait(&self) {
        self.0.cancelled().await;
    }
}

struct TrackedFetch {
    task: FetchTask,
    stage: FetchStage,
    done: CompletionLatch,
}

/// In-flight tasks plus the running tally of outcomes
#[derive(Default)]
struct Registry {
    in_flight: Mutex<HashMap<FetchId, TrackedFetch>>,
    report: Mutex<FetchReport>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    fn insert(&self, task: FetchTask, done: CompletionLatch) {
        lock(&self.in_flight).insert(
            task.id,
            TrackedFetch {
                task,
                stage: FetchStage::Submitted,
                done,
            },
        );
    }

    fn set_stage(&self, id: FetchId, stage: FetchStage) {
        if let Some(tracked) = lock(&self.in_flight).get_mut(&id) {
            tracked.stage = stage;
        }
    }

    /// Record the outcome, fire the latch, then drop the entry
    fn finish(&self, task: &FetchTask, outcome: &FetchOutcome) {
        lock(&self.report).record(&task.url, outcome);
        let mut in_flight = lock(&self.in_flight);
        if let Some(tracked) = in_flight.get_mut(&task.id) {
            tracked.stage = outcome.stage();
            tracked.done.fire();
        }
        in_flight.remove(&task.id);
    }

    fn latches(&self) -> Vec<CompletionLatch> {
        lock(&self.in_flight)
            .values()
            .map(|t| t.done.clone())
            .collect()
    }

    fn snapshot(&self) -> Vec<(FetchTask, FetchStage)> {
        let mut tasks: Vec<_> = lock(&self.in_flight)
            .values()
            .map(|t| (t.task.clone(), t.stage))
            .collect();
        tasks.sort_by_key(|(task, _)| task.id);
        tasks
    }
}

/// Asynchronous image downloader (see the [module docs](self))
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    slots: Arc<Semaphore>,
    registry: Arc<Registry>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    event_tx: broadcast::Sender<FetchEvent>,
    next_id: AtomicU64,
}

impl Fetcher {
    /// Create a fetcher backed by an [`HttpTransport`]
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.max_concurrent_downloads,
        ))
    }

    /// Create a fetcher over any transport, allowing `max_concurrent` requests at once
    pub fn with_transport(transport: Arc<dyn Transport>, max_concurrent: usize) -> Self {
        // Buffer sized for bursts of events between subscriber polls
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            transport,
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            registry: Arc::new(Registry::default()),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            event_tx,
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to fetch events
    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.event_tx.subscribe()
    }

    /// Start downloading `url` into `dest_dir` without waiting for it
    ///
    /// The file name is the sanitized last path segment of the URL. The
    /// directory must exist by the time the body arrives.
    pub fn submit(&self, url: &str, dest_dir: &Path) -> FetchId {
        let id = FetchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task = FetchTask {
            id,
            url: url.to_string(),
            destination: dest_dir.join(image_file_name(url)),
        };
        let done = CompletionLatch::default();
        self.registry.insert(task.clone(), done);
        debug!(fetch_id = %id, url, destination = %task.destination.display(), "fetch submitted");

        let transport = Arc::clone(&self.transport);
        let slots = Arc::clone(&self.slots);
        let registry = Arc::clone(&self.registry);
        let event_tx = self.event_tx.clone();
        let shutdown = self.shutdown.clone();

        self.tracker.spawn(async move {
            // The fetch runs as its own task so a panic in it still ends here
            // with a terminal outcome and a fired latch.
            let worker = {
                let registry = Arc::clone(&registry);
                let event_tx = event_tx.clone();
                let task = task.clone();
                tokio::spawn(async move {
                    fetch_one(transport.as_ref(), &slots, &registry, &event_tx, &task).await
                })
            };
            let abort = worker.abort_handle();
            let outcome = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    abort.abort();
                    FetchOutcome::Cancelled
                }
                joined = worker => match joined {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_cancelled() => FetchOutcome::Cancelled,
                    Err(e) => FetchOutcome::Failed(DownloadError::Request {
                        url: task.url.clone(),
                        reason: format!("fetch worker panicked: {e}"),
                    }),
                },
            };
            log_outcome(&task, &outcome);
            registry.finish(&task, &outcome);
            let event = match outcome {
                FetchOutcome::Completed { path } => FetchEvent::Completed {
                    id: task.id,
                    url: task.url,
                    path,
                },
                FetchOutcome::Failed(error) => FetchEvent::Failed {
                    id: task.id,
                    url: task.url,
                    error,
                },
                FetchOutcome::Cancelled => FetchEvent::Cancelled {
                    id: task.id,
                    url: task.url,
                },
            };
            event_tx.send(event).ok();
        });

        id
    }

    /// Tasks that have not reached a terminal state yet, ordered by id
    pub fn in_flight(&self) -> Vec<(FetchTask, FetchStage)> {
        self.registry.snapshot()
    }

    /// Wait until every task submitted before this call is terminal
    ///
    /// Returns the outcomes recorded so far. Tasks submitted while waiting are
    /// not waited for.
    pub async fn await_idle(&self) -> FetchReport {
        let latches = self.registry.latches();
        debug!(outstanding = latches.len(), "Waiting for outstanding fetches");
        for latch in &latches {
            latch.wait().await;
        }
        lock(&self.registry.report).clone()
    }

    /// Drain every outstanding fetch, then release the transport
    ///
    /// Consumes the fetcher, so no submission can race the shutdown.
    pub async fn close(self) -> FetchReport {
        info!(
            outstanding = self.registry.latches().len(),
            "Disposing fetcher: waiting for outstanding fetches"
        );
        self.await_idle().await;
        self.tracker.close();
        self.tracker.wait().await;

        let leftover = self.registry.snapshot();
        if !leftover.is_empty() {
            warn!(count = leftover.len(), "Fetch tasks left in registry after drain");
        }

        let report = std::mem::take(&mut *lock(&self.registry.report));
        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "Fetcher closed"
        );
        report
    }
}

impl Drop for Fetcher {
    fn drop(&mut self) {
        // Abandon whatever is still running when dropped without close()
        self.shutdown.cancel();
    }
}

async fn fetch_one(
    transport: &dyn Transport,
    slots: &Semaphore,
    registry: &Registry,
    event_tx: &broadcast::Sender<FetchEvent>,
    task: &FetchTask,
) -> FetchOutcome {
    let Ok(_permit) = slots.acquire().await else {
        return FetchOutcome::Cancelled;
    };
    registry.set_stage(task.id, FetchStage::InFlight);
    event_tx
        .send(FetchEvent::Started {
            id: task.id,
            url: task.url.clone(),
        })
        .ok();

    let body = match transport.get(&task.url).await {
        Ok(body) => body,
        Err(e) => return FetchOutcome::Failed(e),
    };

    debug!(url = %task.url, path = %task.destination.display(), bytes = body.len(), "Saving image");
    match tokio::fs::write(&task.destination, &body).await {
        Ok(()) => FetchOutcome::Completed {
            path: task.destination.clone(),
        },
        Err(e) => FetchOutcome::Failed(DownloadError::Write {
            url: task.url.clone(),
            path: task.destination.clone(),
            reason: e.to_string(),
        }),
    }
}

fn log_outcome(task: &FetchTask, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Completed { path } => {
            info!(fetch_id = %task.id, url = %task.url, path = %path.display(), "Download done");
        }
        FetchOutcome::Failed(error) => {
            warn!(fetch_id = %task.id, url = %task.url, error = %error, "Download failed");
        }
        FetchOutcome::Cancelled => {
            warn!(fetch_id = %task.id, url = %task.url, "Download cancelled");
        }
    }
}

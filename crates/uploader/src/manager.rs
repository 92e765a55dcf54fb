//! Fixed-size worker pool serving upload batches.
//!
//! Workers and dispatchers meet on a rendezvous queue: an idle worker
//! publishes a one-shot slot, and a dispatcher hands a task over only after
//! taking such a slot. A task is therefore never buffered waiting for a
//! worker, at most `workers` uploads run at once, and a dispatch that loses
//! the race against batch cancellation never reaches the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Transport};
use crate::types::{UploadEvent, UploadOutcome, UploadTask};
use crate::uploader::FileUploader;

/// Capacity of the event channel handed out by [`UploadManager::take_events`].
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A task handed to a worker together with its single-value result slot.
struct Job {
    task: UploadTask,
    cancel: CancellationToken,
    result: oneshot::Sender<UploadOutcome>,
}

/// Published by an idle worker; redeemed by exactly one dispatcher.
type Slot = oneshot::Sender<Job>;

/// Uploads batches of files with a bounded pool of workers.
pub struct UploadManager {
    workers: usize,
    slots: Mutex<mpsc::Receiver<Slot>>,
    shutdown: CancellationToken,
    handles: Mutex<JoinSet<()>>,
    closed: AtomicBool,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
}

impl UploadManager {
    /// Creates a manager sending over HTTP and starts its workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a manager over a custom transport and starts its workers.
    pub fn with_transport(
        config: UploadConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, UploadError> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let uploader = Arc::new(
            FileUploader::new(
                RetryPolicy::new(config.max_retries, config.retry_delay),
                transport,
                config.use_md5,
            )
            .with_events(events_tx.clone()),
        );

        // Each worker has at most one outstanding slot, so publishing never waits.
        let (slots_tx, slots_rx) = mpsc::channel(config.workers);
        let shutdown = CancellationToken::new();

        let mut handles = JoinSet::new();
        for id in 0..config.workers {
            handles.spawn(worker_loop(
                id,
                Arc::clone(&uploader),
                slots_tx.clone(),
                shutdown.clone(),
                events_tx.clone(),
            ));
        }

        info!(
            workers = config.workers,
            max_retries = config.max_retries,
            retry_delay_ms = config.retry_delay.as_millis() as u64,
            md5 = config.use_md5,
            "upload manager started"
        );

        Ok(Self {
            workers: config.workers,
            slots: Mutex::new(slots_rx),
            shutdown,
            handles: Mutex::new(handles),
            closed: AtomicBool::new(false),
            events_rx: Some(events_rx),
        })
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Uploads every task and returns one outcome per task, in task order.
    ///
    /// `cancel` bounds the whole batch: tasks not yet accepted by a worker
    /// when it fires resolve to [`UploadError::Cancelled`] without touching
    /// the network, and running uploads abort at their next send or backoff.
    pub async fn upload_files(
        &self,
        cancel: &CancellationToken,
        tasks: &[UploadTask],
    ) -> Vec<UploadOutcome> {
        if self.is_closed() {
            return tasks.iter().map(|_| Err(UploadError::Closed)).collect();
        }

        debug!(tasks = tasks.len(), workers = self.workers, "dispatching batch");
        let results = join_all(tasks.iter().map(|task| self.dispatch(task, cancel))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(tasks = tasks.len(), failed, "batch finished");
        results
    }

    /// Stops the workers and waits for them to exit.
    ///
    /// Uploads already running finish first. Calls after the first return
    /// immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("upload manager already closed");
            return;
        }

        self.shutdown.cancel();
        let mut handles = self.handles.lock().await;
        while let Some(joined) = handles.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "upload worker panicked");
            }
        }
        info!("upload manager closed");
    }

    async fn dispatch(&self, task: &UploadTask, cancel: &CancellationToken) -> UploadOutcome {
        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(path = %task.file_path.display(), "dispatch cancelled");
                return Err(UploadError::Cancelled);
            }
            slot = self.next_slot() => slot,
        };
        let Some(slot) = slot else {
            return Err(UploadError::Closed);
        };

        let (result_tx, result_rx) = oneshot::channel();
        let job = Job {
            task: task.clone(),
            cancel: cancel.clone(),
            result: result_tx,
        };
        if slot.send(job).is_err() {
            // The worker exited between publishing the slot and now.
            return Err(UploadError::Closed);
        }

        result_rx.await.unwrap_or(Err(UploadError::WorkerLost))
    }

    async fn next_slot(&self) -> Option<Slot> {
        self.slots.lock().await.recv().await
    }
}

async fn worker_loop(
    id: usize,
    uploader: Arc<FileUploader>,
    slots: mpsc::Sender<Slot>,
    shutdown: CancellationToken,
    events: mpsc::Sender<UploadEvent>,
) {
    debug!(worker = id, "upload worker started");

    loop {
        let (slot_tx, mut slot_rx) = oneshot::channel();
        if slots.send(slot_tx).await.is_err() {
            break;
        }

        let job = tokio::select! {
            biased;
            job = &mut slot_rx => match job {
                Ok(job) => job,
                Err(_) => continue,
            },
            _ = shutdown.cancelled() => break,
        };

        let Job {
            task,
            cancel,
            result,
        } = job;
        let path = task.file_path.clone();

        debug!(worker = id, path = %path.display(), url = %task.url, "upload started");
        let _ = events.try_send(UploadEvent::Started {
            path: path.clone(),
            worker: id,
        });

        let outcome = uploader.upload(&cancel, &task.file_path, &task.url).await;
        let event = match &outcome {
            Ok(sums) => {
                info!(worker = id, path = %path.display(), bytes = sums.len, "upload completed");
                UploadEvent::Completed {
                    path,
                    bytes: sums.len,
                }
            }
            Err(e) => {
                warn!(worker = id, path = %path.display(), error = %e, "upload failed");
                UploadEvent::Failed {
                    path,
                    error: e.to_string(),
                }
            }
        };
        let _ = events.try_send(event);

        // The receiver is gone if the caller stopped waiting.
        let _ = result.send(outcome);
    }

    debug!(worker = id, "upload worker stopped");
}

//! Background deletion of short URLs.
//!
//! Handlers enqueue a [`DeletionRequest`] and answer right away; a fixed set of
//! workers applies the soft delete later. Failures are logged and never reach
//! the submitter.

use crate::error::{Result, ShortenerError};
use shorty_core::{Repository, ShortUrl};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Ids a user asked to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub uid: String,
    pub ids: Vec<String>,
}

impl DeletionRequest {
    pub fn new(uid: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            uid: uid.into(),
            ids,
        }
    }

    fn batch(&self) -> Vec<ShortUrl> {
        self.ids
            .iter()
            .map(|id| ShortUrl::owned_by(id.as_str(), self.uid.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct PoolSettings {
    /// Number of workers, also the queue capacity. Zero is treated as one.
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Upper bound for a single deletion.
    #[builder(default = DEFAULT_TASK_TIMEOUT)]
    pub task_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Producer side of the deletion pool.
///
/// Submitting waits while the queue is full.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    tx: mpsc::Sender<DeletionRequest>,
}

impl DeletionQueue {
    pub async fn submit(&self, request: DeletionRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ShortenerError::DeletionQueueClosed)
    }
}

pub struct DeletionPool {
    queue: DeletionQueue,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl DeletionPool {
    /// Starts the workers on the current tokio runtime.
    pub fn spawn<R>(repository: Arc<R>, settings: PoolSettings) -> Self
    where
        R: Repository + ?Sized,
    {
        let size = settings.workers.max(1);
        let (tx, rx) = mpsc::channel(size);
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown, signal) = watch::channel(false);

        let workers = (0..size)
            .map(|worker| {
                tokio::spawn(work(
                    worker,
                    repository.clone(),
                    rx.clone(),
                    signal.clone(),
                    settings.task_timeout,
                ))
            })
            .collect();

        info!(workers = size, task_timeout = ?settings.task_timeout, "deletion pool started");

        Self {
            queue: DeletionQueue { tx },
            shutdown,
            workers,
        }
    }

    pub fn queue(&self) -> DeletionQueue {
        self.queue.clone()
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Stops accepting requests, finishes every queued one and waits for the
    /// workers to exit.
    pub async fn shutdown(self) {
        let Self {
            queue,
            shutdown,
            workers,
        } = self;
        drop(queue);
        // Workers also stop once every sender is gone, so a send error is fine.
        let _ = shutdown.send(true);

        for handle in workers {
            if let Err(err) = handle.await {
                error!(error = %err, "deletion worker failed");
            }
        }

        info!("deletion pool stopped");
    }
}

async fn work<R>(
    worker: usize,
    repository: Arc<R>,
    rx: Arc<Mutex<mpsc::Receiver<DeletionRequest>>>,
    mut signal: watch::Receiver<bool>,
    task_timeout: Duration,
) where
    R: Repository + ?Sized,
{
    loop {
        let request = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                request = rx.recv() => request,
                _ = signal.changed() => {
                    // Refuse new requests, keep what is already buffered.
                    rx.close();
                    rx.recv().await
                }
            }
        };

        let Some(request) = request else {
            break;
        };
        run(worker, repository.as_ref(), request, task_timeout).await;
    }

    debug!(worker, "deletion worker exited");
}

async fn run<R>(worker: usize, repository: &R, request: DeletionRequest, task_timeout: Duration)
where
    R: Repository + ?Sized,
{
    let batch = request.batch();
    match tokio::time::timeout(task_timeout, repository.delete(&batch)).await {
        Ok(Ok(())) => {
            debug!(worker, uid = %request.uid, ids = batch.len(), "urls deleted");
        }
        Ok(Err(err)) => {
            error!(worker, uid = %request.uid, error = %err, "failed to delete urls");
        }
        Err(_) => {
            warn!(worker, uid = %request.uid, timeout = ?task_timeout, "url deletion timed out");
        }
    }
}

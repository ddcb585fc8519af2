//! Moderation worker pool: bounded channel, semaphore-limited workers, retry.
//!
//! Shutdown: [`ModerationWorkerPool::shutdown`] stops accepting jobs, drops
//! whatever is still queued and waits for in-flight jobs to finish.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use trigpics_core::{Config, ErrorMetadata};

use crate::context::{ModerationHandler, ModerationJob};

/// Maximum delay in seconds before retrying a failed job.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 60;

/// Exponential backoff with cap.
#[inline]
pub(crate) fn compute_retry_backoff_seconds(attempt: u32) -> u64 {
    2_u64.saturating_pow(attempt).min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("moderation queue is full")]
    Full,
    #[error("moderation queue is closed")]
    Closed,
}

/// Non-blocking submission seam used by the photo flows.
pub trait ModerationQueue: Send + Sync {
    fn enqueue(&self, photo_id: i64) -> Result<(), EnqueueError>;
}

#[derive(Debug, Clone)]
pub struct ModerationPoolConfig {
    pub workers: usize,
    pub capacity: usize,
    pub job_timeout: Duration,
    pub max_retries: u32,
}

impl Default for ModerationPoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 256,
            job_timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl ModerationPoolConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.moderation_workers(),
            capacity: config.moderation_queue_capacity(),
            ..Self::default()
        }
    }
}

pub struct ModerationWorkerPool {
    job_tx: mpsc::Sender<ModerationJob>,
    shutdown_tx: mpsc::Sender<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ModerationWorkerPool {
    /// Spawn the dispatcher. Must be called inside a tokio runtime.
    pub fn new(config: ModerationPoolConfig, handler: Arc<dyn ModerationHandler>) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = tokio::spawn(Self::worker_pool(config, handler, job_rx, shutdown_rx));

        Self {
            job_tx,
            shutdown_tx,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Signal the dispatcher and wait until running jobs are done.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Moderation dispatcher panicked");
            }
        }
    }

    async fn worker_pool(
        config: ModerationPoolConfig,
        handler: Arc<dyn ModerationHandler>,
        mut job_rx: mpsc::Receiver<ModerationJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let workers = config.workers.max(1);
        tracing::info!(
            workers = workers,
            capacity = config.capacity,
            "Moderation worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(workers));

        loop {
            let job = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Moderation worker pool shutting down");
                    break;
                }
                job = job_rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let handler = handler.clone();
            let config = config.clone();
            tokio::spawn(async move {
                let _permit = permit;
                Self::process_job_with_retry(job, handler, &config).await;
            });
        }

        job_rx.close();
        let dropped = std::iter::from_fn(|| job_rx.try_recv().ok()).count();
        if dropped > 0 {
            tracing::warn!(dropped = dropped, "Dropped queued moderation jobs on shutdown");
        }

        // every permit back means every spawned job has finished
        let _ = semaphore.acquire_many(workers as u32).await;
        tracing::info!("Moderation worker pool stopped");
    }

    #[tracing::instrument(skip(handler, config), fields(photo_id = job.photo_id))]
    async fn process_job_with_retry(
        job: ModerationJob,
        handler: Arc<dyn ModerationHandler>,
        config: &ModerationPoolConfig,
    ) {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::time::timeout(config.job_timeout, handler.moderate(&job)).await;

            let error = match result {
                Ok(Ok(outcome)) => {
                    tracing::info!(
                        outcome = ?outcome,
                        queued_ms = (chrono::Utc::now() - job.enqueued_at).num_milliseconds(),
                        "Moderation job completed"
                    );
                    return;
                }
                Ok(Err(e)) if !e.is_recoverable() => {
                    tracing::error!(error = %e, "Moderation job failed permanently");
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", config.job_timeout),
            };

            if attempt >= config.max_retries {
                tracing::error!(
                    error = %error,
                    attempts = attempt + 1,
                    "Moderation job failed after retries"
                );
                return;
            }

            let backoff = compute_retry_backoff_seconds(attempt);
            tracing::warn!(
                error = %error,
                attempt = attempt + 1,
                backoff_secs = backoff,
                "Moderation job failed, retrying"
            );
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            attempt += 1;
        }
    }
}

impl ModerationQueue for ModerationWorkerPool {
    fn enqueue(&self, photo_id: i64) -> Result<(), EnqueueError> {
        self.job_tx
            .try_send(ModerationJob::new(photo_id))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModerationOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use trigpics_core::AppError;

    #[derive(Default)]
    struct RecordingHandler {
        seen: std::sync::Mutex<Vec<i64>>,
        done: Notify,
    }

    #[async_trait]
    impl ModerationHandler for RecordingHandler {
        async fn moderate(&self, job: &ModerationJob) -> Result<ModerationOutcome, AppError> {
            self.seen.lock().unwrap().push(job.photo_id);
            self.done.notify_one();
            Ok(ModerationOutcome::Approved)
        }
    }

    struct BlockingHandler {
        release: Notify,
    }

    #[async_trait]
    impl ModerationHandler for BlockingHandler {
        async fn moderate(&self, _job: &ModerationJob) -> Result<ModerationOutcome, AppError> {
            self.release.notified().await;
            Ok(ModerationOutcome::Approved)
        }
    }

    struct FailingHandler {
        calls: AtomicUsize,
        recoverable: bool,
    }

    #[async_trait]
    impl ModerationHandler for FailingHandler {
        async fn moderate(&self, _job: &ModerationJob) -> Result<ModerationOutcome, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.recoverable {
                Err(AppError::Storage("classifier unavailable".to_string()))
            } else {
                Err(AppError::NotFound("photo".to_string()))
            }
        }
    }

    fn config(workers: usize, capacity: usize) -> ModerationPoolConfig {
        ModerationPoolConfig {
            workers,
            capacity,
            job_timeout: Duration::from_secs(5),
            max_retries: 0,
        }
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(3), 8);
        assert_eq!(compute_retry_backoff_seconds(10), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(200), MAX_RETRY_BACKOFF_SECS);
    }

    #[tokio::test]
    async fn test_enqueued_jobs_reach_handler() {
        let handler = Arc::new(RecordingHandler::default());
        let pool = ModerationWorkerPool::new(config(2, 8), handler.clone());

        pool.enqueue(1).unwrap();
        pool.enqueue(2).unwrap();
        pool.shutdown().await;

        let mut seen = handler.seen.lock().unwrap().clone();
        seen.sort();
        assert!(seen.iter().all(|id| [1, 2].contains(id)));
    }

    #[tokio::test]
    async fn test_single_job_is_processed() {
        let handler = Arc::new(RecordingHandler::default());
        let pool = ModerationWorkerPool::new(config(1, 8), handler.clone());

        pool.enqueue(42).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handler.done.notified())
            .await
            .unwrap();

        assert_eq!(*handler.seen.lock().unwrap(), vec![42]);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let handler = Arc::new(BlockingHandler {
            release: Notify::new(),
        });
        let pool = ModerationWorkerPool::new(config(1, 1), handler.clone());

        // one running, one held by the dispatcher, one buffered: the fourth must fail
        let results: Vec<_> = (0..4).map(|id| pool.enqueue(id)).collect();
        assert!(results.contains(&Err(EnqueueError::Full)));
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_closed() {
        let handler = Arc::new(RecordingHandler::default());
        let pool = ModerationWorkerPool::new(config(1, 4), handler);
        pool.shutdown().await;

        assert_eq!(pool.enqueue(7), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn test_unrecoverable_failure_is_not_retried() {
        let handler = Arc::new(FailingHandler {
            calls: AtomicUsize::new(0),
            recoverable: false,
        });
        let mut cfg = config(1, 4);
        cfg.max_retries = 3;
        let pool = ModerationWorkerPool::new(cfg, handler.clone());

        pool.enqueue(9).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        pool.shutdown().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}

use crate::services::assets::AssetStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Base delay before retrying a failed delete; doubles per attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug)]
struct CleanupJob {
    key: String,
    attempt: u32,
}

/// Handle to the background queue that deletes retired asset files.
///
/// Scheduling never blocks and never fails the caller. Deletes that fail are
/// retried with exponential backoff and logged once attempts run out.
#[derive(Clone)]
pub struct AssetCleaner {
    tx: mpsc::UnboundedSender<CleanupJob>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl AssetCleaner {
    /// Starts the cleanup task. It exits once `shutdown` flips, after one
    /// final pass over whatever is still queued.
    pub fn spawn(
        store: Arc<dyn AssetStore>,
        max_attempts: u32,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cleaner = Self {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        };

        let worker = CleanupWorker {
            store,
            max_attempts: max_attempts.max(1),
            rx,
            cleaner: cleaner.clone(),
            shutdown,
        };
        let handle = tokio::spawn(worker.run());

        (cleaner, handle)
    }

    /// Queues a store key for deletion.
    pub fn schedule(&self, key: String) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(CleanupJob { key, attempt: 0 }).is_err() {
            tracing::warn!("Asset cleanup queue closed, file left in place");
            self.finish_one();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolves once every scheduled deletion has succeeded or been given up.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn requeue(&self, job: CleanupJob, delay: Duration) {
        let tx = self.tx.clone();
        let cleaner = self.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if tx.send(job).is_err() {
                cleaner.finish_one();
            }
        });
    }

    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

struct CleanupWorker {
    store: Arc<dyn AssetStore>,
    max_attempts: u32,
    rx: mpsc::UnboundedReceiver<CleanupJob>,
    cleaner: AssetCleaner,
    shutdown: watch::Receiver<bool>,
}

impl CleanupWorker {
    async fn run(mut self) {
        tracing::info!("🧹 Asset cleanup worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    break;
                }
                job = self.rx.recv() => {
                    match job {
                        Some(job) => self.process(job, true).await,
                        None => break,
                    }
                }
            }
        }

        // Final pass without retries so shutdown is not held up by backoff
        while let Ok(job) = self.rx.try_recv() {
            self.process(job, false).await;
        }

        tracing::info!("🛑 Asset cleanup worker stopped");
    }

    async fn process(&self, mut job: CleanupJob, allow_retry: bool) {
        job.attempt += 1;

        match self.delete(&job.key).await {
            Ok(()) => {
                tracing::debug!("Deleted retired asset {}", job.key);
                self.cleaner.finish_one();
            }
            Err(e) if allow_retry && job.attempt < self.max_attempts => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(job.attempt - 1);
                tracing::debug!(
                    "Delete of {} failed (attempt {}), retrying in {:?}: {}",
                    job.key,
                    job.attempt,
                    delay,
                    e
                );
                self.cleaner.requeue(job, delay);
            }
            Err(e) => {
                tracing::warn!(
                    "Asset cleanup gave up on {} after {} attempt(s): {}",
                    job.key,
                    job.attempt,
                    e
                );
                self.cleaner.finish_one();
            }
        }
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        if !self.store.exists(key).await? {
            return Ok(());
        }
        self.store.delete(key).await
    }
}

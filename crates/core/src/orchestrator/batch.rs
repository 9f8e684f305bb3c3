//! Batch matching over unlinked library files.
//!
//! A batch selects eligible files, fans them out to a bounded pool of
//! workers and collects per-file outcomes in selection order. At most one
//! batch runs at a time; a second request while one is in flight is
//! rejected rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::BatchConfig;
use crate::library::LibraryFile;
use crate::metrics::BATCH_RUNS;

use super::runner::MatchOrchestrator;
use super::types::{BatchError, BatchItem, BatchRequest, BatchResult};

/// Single-holder lock guarding batch runs.
#[derive(Debug, Clone)]
pub struct RunLock {
    name: String,
    held: Arc<AtomicBool>,
}

impl RunLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the lock, or `None` if someone else holds it.
    pub fn try_acquire(&self) -> Option<RunLockGuard> {
        if self.held.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(RunLockGuard {
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

/// Releases the [`RunLock`] when dropped.
#[derive(Debug)]
pub struct RunLockGuard {
    held: Arc<AtomicBool>,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

/// Runs batches of file matches, one batch at a time.
pub struct BatchScheduler {
    orchestrator: Arc<MatchOrchestrator>,
    config: BatchConfig,
    lock: RunLock,
}

impl BatchScheduler {
    pub fn new(orchestrator: Arc<MatchOrchestrator>, config: BatchConfig) -> Self {
        Self {
            orchestrator,
            config,
            lock: RunLock::new("batch-match"),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Whether a batch is currently in flight.
    pub fn is_running(&self) -> bool {
        self.lock.is_held()
    }

    /// Run a batch and wait for it to finish.
    pub async fn run_batch(&self, request: BatchRequest) -> Result<BatchResult, BatchError> {
        let Some(guard) = self.lock.try_acquire() else {
            warn!("Batch run {} already running", self.lock.name());
            BATCH_RUNS.with_label_values(&["already_running"]).inc();
            return Err(BatchError::AlreadyRunning(self.lock.name().to_string()));
        };
        let result = execute(
            Arc::clone(&self.orchestrator),
            self.config.clone(),
            request,
        )
        .await;
        drop(guard);
        result
    }

    /// Start a batch in the background.
    ///
    /// Returns `false` without starting anything if a batch is already
    /// running. The lock is taken before this returns, so two triggers
    /// never both start.
    pub fn trigger(&self, request: BatchRequest) -> bool {
        let Some(guard) = self.lock.try_acquire() else {
            info!("Batch trigger skipped: {} already running", self.lock.name());
            BATCH_RUNS.with_label_values(&["already_running"]).inc();
            return false;
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let config = self.config.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = execute(orchestrator, config, request).await {
                error!("Triggered batch failed: {}", e);
            }
        });
        true
    }
}

async fn execute(
    orchestrator: Arc<MatchOrchestrator>,
    config: BatchConfig,
    request: BatchRequest,
) -> Result<BatchResult, BatchError> {
    let run_id = Uuid::new_v4().to_string();
    let limit = request.effective_limit(&config);
    let concurrency = request.effective_concurrency(&config);
    let started = Instant::now();

    let files = match orchestrator
        .library()
        .find_eligible_files(&request.filter(), limit)
    {
        Ok(files) => files,
        Err(e) => {
            error!("Batch {} could not select files: {}", run_id, e);
            BATCH_RUNS.with_label_values(&["failed"]).inc();
            return Err(BatchError::Library(e));
        }
    };

    info!(
        "Batch {} starting: {} files, concurrency {}, dry_run {}",
        run_id,
        files.len(),
        concurrency,
        request.dry_run
    );

    let items = run_pool(orchestrator, files, concurrency, request.dry_run).await;

    let mut result = BatchResult {
        run_id,
        scanned: items.len(),
        ..BatchResult::default()
    };
    for item in &items {
        match item.status_code {
            200 => {
                if item.result.as_ref().is_some_and(|r| r.autolinked) {
                    result.matched += 1;
                }
            }
            409 => result.skipped_already_matched += 1,
            _ => result.errors += 1,
        }
    }
    result.results = items;

    info!(
        "Batch {} finished in {:?}: scanned {}, matched {}, skipped {}, errors {}",
        result.run_id,
        started.elapsed(),
        result.scanned,
        result.matched,
        result.skipped_already_matched,
        result.errors
    );
    BATCH_RUNS.with_label_values(&["completed"]).inc();
    Ok(result)
}

/// Match `files` with at most `concurrency` workers. Items come back in
/// the order of `files` regardless of completion order.
async fn run_pool(
    orchestrator: Arc<MatchOrchestrator>,
    files: Vec<LibraryFile>,
    concurrency: usize,
    dry_run: bool,
) -> Vec<BatchItem> {
    let total = files.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = concurrency.clamp(1, total);

    let (job_tx, job_rx) = mpsc::channel::<(usize, LibraryFile)>(total);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (item_tx, mut item_rx) = mpsc::channel::<(usize, BatchItem)>(total);

    for _ in 0..workers {
        let orchestrator = Arc::clone(&orchestrator);
        let job_rx = Arc::clone(&job_rx);
        let item_tx = item_tx.clone();
        tokio::spawn(async move {
            loop {
                let job = job_rx.lock().await.recv().await;
                let Some((index, file)) = job else {
                    break;
                };
                let item = match_one(&orchestrator, file, dry_run).await;
                if item_tx.send((index, item)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(item_tx);

    // Remember identities so a lost worker still yields a row.
    let identities: Vec<(u64, String)> = files.iter().map(|f| (f.id, f.filename.clone())).collect();
    for job in files.into_iter().enumerate() {
        if job_tx.send(job).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    let mut slots: Vec<Option<BatchItem>> = vec![None; total];
    while let Some((index, item)) = item_rx.recv().await {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(item);
        }
    }

    slots
        .into_iter()
        .zip(identities)
        .map(|(slot, (file_id, filename))| {
            slot.unwrap_or_else(|| BatchItem {
                file_id,
                filename,
                status_code: 500,
                error: Some("worker stopped before producing a result".to_string()),
                result: None,
            })
        })
        .collect()
}

async fn match_one(orchestrator: &MatchOrchestrator, file: LibraryFile, dry_run: bool) -> BatchItem {
    match orchestrator.match_file(file.id, dry_run).await {
        Ok(result) => BatchItem {
            file_id: file.id,
            filename: file.filename,
            status_code: 200,
            error: None,
            result: Some(result),
        },
        Err(e) => BatchItem {
            file_id: file.id,
            filename: file.filename,
            status_code: e.status_code(),
            error: Some(e.to_string()),
            result: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lock_single_holder() {
        let lock = RunLock::new("test");
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_run_lock_clones_share_state() {
        let lock = RunLock::new("shared");
        let other = lock.clone();
        let _guard = lock.try_acquire().unwrap();
        assert!(other.is_held());
        assert!(other.try_acquire().is_none());
        assert_eq!(other.name(), "shared");
    }
}

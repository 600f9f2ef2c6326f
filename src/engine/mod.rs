//! Illustration engine: the coordinator bridging the in-memory task queue
//! (ephemeral, rebuildable) and the durable task store (source of truth),
//! driving a single background worker through the injected generation
//! backend.

pub mod generator;
pub mod prompt;
pub mod queue;
pub mod types;
pub mod visual;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::db::models::PersistedIllustrationTask;
use crate::db::repos::tasks as task_repo;
use crate::db::DbPool;
use crate::error::EngineError;

use self::generator::IllustrationGenerator;
use self::queue::TaskQueue;
use self::types::{
    CoordinatorStats, CreateTaskInput, GenerationRequest, IllustrationTask, TaskStatus,
    TaskStatusEvent,
};

/// Capacity of the status broadcast channel. Slow subscribers lag and drop
/// old events rather than back-pressuring the worker.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// State shared between the coordinator handle and its worker loop.
struct CoordinatorShared {
    pool: DbPool,
    queue: Mutex<TaskQueue>,
    generator: Arc<dyn IllustrationGenerator>,
    config: CoordinatorConfig,
    running: AtomicBool,
    events_tx: broadcast::Sender<TaskStatusEvent>,
    tasks_dispatched: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_retried: AtomicU64,
}

/// Orchestrates illustration generation for story pages.
///
/// Owns the priority queue and the background worker; the durable store is
/// the source of truth for task lifecycle, the queue a derived cache of
/// its pending set. `start` reconciles the two, which is what makes task
/// processing survive process restarts.
pub struct IllustrationCoordinator {
    shared: Arc<CoordinatorShared>,
    /// Worker slot; also the start/stop lifecycle lock.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IllustrationCoordinator {
    pub fn new(
        pool: DbPool,
        generator: Arc<dyn IllustrationGenerator>,
        config: CoordinatorConfig,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(CoordinatorShared {
                pool,
                queue: Mutex::new(TaskQueue::new()),
                generator,
                config,
                running: AtomicBool::new(false),
                events_tx,
                tasks_dispatched: AtomicU64::new(0),
                tasks_completed: AtomicU64::new(0),
                tasks_failed: AtomicU64::new(0),
                tasks_retried: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Run crash recovery and launch the worker loop. Idempotent while
    /// already running.
    ///
    /// Recovery resets every in-flight record (`scheduled`/`generating`)
    /// back to `pending`, then rebuilds the queue from the store's pending
    /// set, so no task stays stuck because the previous process died
    /// mid-generation.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut worker = self.worker.lock().await;
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Coordinator already running");
            return Ok(());
        }

        let recovered = match recover_pending(&self.shared).await {
            Ok(count) => count,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let shared = self.shared.clone();
        *worker = Some(tokio::spawn(async move {
            worker_loop(shared).await;
        }));

        tracing::info!(recovered_tasks = recovered, "Illustration coordinator started");
        Ok(())
    }

    /// Halt the worker loop. A generation call already in flight completes
    /// and its result is recorded; nothing new is dequeued afterwards.
    ///
    /// Serializes with `start` on the worker slot: a concurrent start
    /// waits until the outgoing worker is joined, then starts fresh.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = worker.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker task did not shut down cleanly");
            }
        }

        tracing::info!("Illustration coordinator stopped");
    }

    /// Persist a new task and make it dispatchable.
    ///
    /// The task is durable before it is visible to the worker; a crash
    /// between the two steps is repaired by recovery at the next start.
    pub async fn enqueue(&self, input: CreateTaskInput) -> Result<IllustrationTask, EngineError> {
        let task = IllustrationTask::new(&input.page_id, &input.story_id, input.priority);

        let record = task_repo::save(
            &self.shared.pool,
            &task,
            input.page_number,
            input.total_pages,
            &input.description,
            input.previous_illustration_path.as_deref(),
        )?;
        emit_status(&self.shared, &record);

        {
            let mut queue = self.shared.queue.lock().await;
            queue.add(task.clone());
        }

        tracing::info!(
            task_id = %task.id,
            page_id = %task.page_id,
            story_id = %task.story_id,
            priority = %task.priority,
            "Illustration task enqueued"
        );
        Ok(task)
    }

    /// Re-enqueue a failed task. Returns `None` when the id is unknown or
    /// the task is not currently `failed`. The attempt counter is kept or
    /// zeroed according to configuration.
    pub async fn retry_task(&self, id: &str) -> Result<Option<IllustrationTask>, EngineError> {
        let Some(record) = task_repo::get(&self.shared.pool, id)? else {
            return Ok(None);
        };
        if record.status != TaskStatus::Failed {
            tracing::debug!(task_id = %id, status = %record.status, "Retry refused, task not failed");
            return Ok(None);
        }

        if self.shared.config.reset_attempts_on_manual_retry {
            task_repo::reset_attempts(&self.shared.pool, id)?;
        }

        let Some(pending) = task_repo::update_status(&self.shared.pool, id, TaskStatus::Pending)?
        else {
            return Ok(None);
        };
        emit_status(&self.shared, &pending);

        let task = pending.to_task();
        {
            let mut queue = self.shared.queue.lock().await;
            queue.add(task.clone());
        }

        tracing::info!(task_id = %id, attempts = pending.attempts, "Manual retry enqueued");
        Ok(Some(task))
    }

    /// Drop every queued entry. Durable records are untouched; deleting
    /// those takes `delete_story_tasks` or the store's delete operations.
    pub async fn clear_all(&self) {
        let mut queue = self.shared.queue.lock().await;
        let dropped = queue.len();
        queue.clear();
        tracing::info!(dropped = dropped, "Cleared illustration queue");
    }

    /// Remove a story's tasks from both the queue and the store. Returns
    /// the number of durable records deleted.
    pub async fn delete_story_tasks(&self, story_id: &str) -> Result<usize, EngineError> {
        {
            let mut queue = self.shared.queue.lock().await;
            queue.remove_story(story_id);
        }
        let deleted = task_repo::delete_all_for_story(&self.shared.pool, story_id)?;
        tracing::info!(story_id = %story_id, deleted = deleted, "Deleted story tasks");
        Ok(deleted)
    }

    /// Remove a page's tasks from both the queue and the store. Returns
    /// the number of durable records deleted.
    pub async fn delete_page_tasks(&self, page_id: &str) -> Result<usize, EngineError> {
        {
            let mut queue = self.shared.queue.lock().await;
            queue.remove_page(page_id);
        }
        let deleted = task_repo::delete_for_page(&self.shared.pool, page_id)?;
        tracing::info!(page_id = %page_id, deleted = deleted, "Deleted page tasks");
        Ok(deleted)
    }

    /// Subscribe to status events. Each transition is broadcast after it is
    /// durably recorded; startup recovery resets are not broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskStatusEvent> {
        self.shared.events_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub async fn queue_len(&self) -> usize {
        self.shared.queue.lock().await.len()
    }

    pub async fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            running: self.is_running(),
            queue_len: self.queue_len().await,
            tasks_dispatched: self.shared.tasks_dispatched.load(Ordering::Relaxed),
            tasks_completed: self.shared.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.shared.tasks_failed.load(Ordering::Relaxed),
            tasks_retried: self.shared.tasks_retried.load(Ordering::Relaxed),
        }
    }
}

/// Startup reconciliation: store content wins, queue is rebuilt.
async fn recover_pending(shared: &Arc<CoordinatorShared>) -> Result<usize, EngineError> {
    let records = task_repo::all_pending(&shared.pool)?;

    let mut queue = shared.queue.lock().await;
    queue.clear();

    let mut count = 0;
    for record in records {
        let record = if record.status.is_in_flight() {
            tracing::info!(
                task_id = %record.id,
                stale_status = %record.status,
                "Resetting in-flight task to pending"
            );
            match task_repo::update_status(&shared.pool, &record.id, TaskStatus::Pending)? {
                Some(updated) => updated,
                // Deleted between the scan and the reset.
                None => continue,
            }
        } else {
            record
        };

        queue.add(record.to_task());
        count += 1;
    }

    Ok(count)
}

async fn worker_loop(shared: Arc<CoordinatorShared>) {
    tracing::info!("Illustration worker loop starting");

    loop {
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }

        let next = shared.queue.lock().await.next();
        match next {
            Some(task) => process_task(&shared, task).await,
            None => tokio::time::sleep(shared.config.poll_interval()).await,
        }
    }

    tracing::info!("Illustration worker loop exited");
}

async fn process_task(shared: &Arc<CoordinatorShared>, task: IllustrationTask) {
    shared.tasks_dispatched.fetch_add(1, Ordering::Relaxed);

    // Two observable transitions before the external call, so watchers can
    // distinguish "dispatched" from "actively producing".
    if mark_status(shared, &task.id, TaskStatus::Scheduled).is_none() {
        return;
    }
    let Some(record) = mark_status(shared, &task.id, TaskStatus::Generating) else {
        return;
    };

    let request = GenerationRequest {
        task_id: record.id.clone(),
        page_id: record.page_id.clone(),
        story_id: record.story_id.clone(),
        prompt: record.description.clone(),
        page_number: record.page_number,
        total_pages: record.total_pages,
        attempt: record.attempts + 1,
        previous_illustration_path: record.previous_illustration_path.clone(),
    };

    let started = std::time::Instant::now();
    let result = shared.generator.generate(request).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(output) => {
            shared.tasks_completed.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                task_id = %task.id,
                page_id = %task.page_id,
                output_path = %output.output_path,
                duration_ms = duration_ms,
                "Illustration ready"
            );
            match task_repo::mark_ready(&shared.pool, &task.id, &output.output_path) {
                Ok(Some(record)) => emit_status(shared, &record),
                Ok(None) => {
                    tracing::debug!(task_id = %task.id, "Task deleted mid-generation, dropping result");
                }
                Err(e) => {
                    tracing::error!(task_id = %task.id, error = %e, "Failed to record ready status");
                }
            }
        }
        Err(error) => handle_failure(shared, &task, error, duration_ms).await,
    }
}

async fn handle_failure(
    shared: &Arc<CoordinatorShared>,
    task: &IllustrationTask,
    error: EngineError,
    duration_ms: u64,
) {
    shared.tasks_failed.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(
        task_id = %task.id,
        page_id = %task.page_id,
        error = %error,
        error_kind = error.kind(),
        duration_ms = duration_ms,
        "Illustration generation failed"
    );

    match task_repo::mark_failed(&shared.pool, &task.id, &error.to_string()) {
        Ok(Some(record)) => emit_status(shared, &record),
        Ok(None) => return,
        Err(e) => {
            tracing::error!(task_id = %task.id, error = %e, "Failed to record failure");
            return;
        }
    }

    if !error.is_retryable() {
        tracing::warn!(task_id = %task.id, "Error is not retryable, leaving task failed");
        return;
    }

    // Count this failure against the budget, then decide.
    let attempts = match task_repo::increment_attempt(&shared.pool, &task.id) {
        Ok(Some(record)) => record.attempts,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(task_id = %task.id, error = %e, "Failed to count attempt");
            return;
        }
    };

    if attempts >= shared.config.max_attempts {
        tracing::warn!(
            task_id = %task.id,
            attempts = attempts,
            max_attempts = shared.config.max_attempts,
            "Retry budget exhausted, task stays failed"
        );
        return;
    }

    match task_repo::update_status(&shared.pool, &task.id, TaskStatus::Pending) {
        Ok(Some(pending)) => {
            shared.tasks_retried.fetch_add(1, Ordering::Relaxed);
            emit_status(shared, &pending);
            let mut queue = shared.queue.lock().await;
            queue.add(pending.to_task());
            tracing::info!(
                task_id = %task.id,
                attempt = attempts + 1,
                max_attempts = shared.config.max_attempts,
                "Task re-queued for retry"
            );
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(task_id = %task.id, error = %e, "Failed to re-queue task");
        }
    }
}

/// Persist one status transition and broadcast it. `None` means the task
/// is gone or the store write failed; the caller abandons the dispatch
/// either way and the loop moves on.
fn mark_status(
    shared: &Arc<CoordinatorShared>,
    task_id: &str,
    status: TaskStatus,
) -> Option<PersistedIllustrationTask> {
    match task_repo::update_status(&shared.pool, task_id, status) {
        Ok(Some(record)) => {
            emit_status(shared, &record);
            Some(record)
        }
        Ok(None) => {
            tracing::debug!(task_id = %task_id, "Task vanished before dispatch, skipping");
            None
        }
        Err(e) => {
            tracing::error!(
                task_id = %task_id,
                status = %status,
                error = %e,
                "Failed to persist status transition"
            );
            None
        }
    }
}

fn emit_status(shared: &CoordinatorShared, record: &PersistedIllustrationTask) {
    let _ = shared.events_tx.send(TaskStatusEvent {
        task_id: record.id.clone(),
        page_id: record.page_id.clone(),
        story_id: record.story_id.clone(),
        status: record.status,
        attempts: record.attempts,
        error: record.error_message.clone(),
    });
}

//! Shared vocabulary for the illustration engine: task priorities, the
//! status state machine, queue entries, and the payloads exchanged with
//! the generation backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Priority
// =============================================================================

/// Dispatch priority for illustration tasks. Higher variants are served first;
/// tasks of equal priority are served in arrival order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Bulk or speculative regeneration.
    Low = 0,
    /// Standard page illustration work.
    #[default]
    Medium = 1,
    /// Pages the reader is about to reach.
    High = 2,
    /// Blocking work, e.g. the page currently on screen or the story's
    /// global reference sheet.
    Critical = 3,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(format!("unknown task priority: {other}")),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Lifecycle state of an illustration task.
///
/// ```text
/// pending -> scheduled -> generating -> ready
///                                    -> failed -> pending (retry)
/// ```
///
/// `scheduled` and `generating` are in-flight states; a process crash can
/// strand tasks there, and startup recovery resets them to `pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Scheduled,
    Generating,
    Ready,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Generating => "generating",
            TaskStatus::Ready => "ready",
            TaskStatus::Failed => "failed",
        }
    }

    /// States the worker loop has claimed but not resolved. Records stuck
    /// here after a crash are what startup recovery repairs.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Generating)
    }

    /// Resolved states. `failed` stays terminal unless a retry moves the
    /// task back to `pending`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Ready | TaskStatus::Failed)
    }

    /// Legal edges of the status machine. Self-transitions are not listed;
    /// callers treat them as idempotent touches.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Scheduled)
                | (TaskStatus::Scheduled, TaskStatus::Generating)
                | (TaskStatus::Generating, TaskStatus::Ready)
                | (TaskStatus::Generating, TaskStatus::Failed)
                | (TaskStatus::Failed, TaskStatus::Pending)
                | (TaskStatus::Scheduled, TaskStatus::Pending)
                | (TaskStatus::Generating, TaskStatus::Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "generating" => Ok(TaskStatus::Generating),
            "ready" => Ok(TaskStatus::Ready),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// One unit of queued work: produce one illustration for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IllustrationTask {
    pub id: String,
    pub page_id: String,
    pub story_id: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IllustrationTask {
    pub fn new(page_id: &str, story_id: &str, priority: TaskPriority) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            page_id: page_id.to_string(),
            story_id: story_id.to_string(),
            priority,
            status: TaskStatus::Pending,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for enqueueing a new illustration task via the coordinator.
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub page_id: String,
    pub story_id: String,
    pub priority: TaskPriority,
    /// 1-based position of the page within the story.
    pub page_number: u32,
    pub total_pages: u32,
    /// Composed generation prompt for this page.
    pub description: String,
    /// Handle to the prior page's finished illustration, when one exists.
    pub previous_illustration_path: Option<String>,
}

// =============================================================================
// Generation payloads
// =============================================================================

/// Everything the injected generation backend needs for one illustration.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task_id: String,
    pub page_id: String,
    pub story_id: String,
    pub prompt: String,
    pub page_number: u32,
    pub total_pages: u32,
    /// 1-based attempt number for this dispatch.
    pub attempt: u32,
    pub previous_illustration_path: Option<String>,
}

/// A finished illustration handed back by the generation backend.
#[derive(Debug, Clone)]
pub struct GeneratedIllustration {
    /// Where the backend stored the rendered image.
    pub output_path: String,
    /// Model or pipeline identifier, when the backend reports one.
    pub model_used: Option<String>,
}

// =============================================================================
// Observability
// =============================================================================

/// Broadcast on each status change the coordinator records, except the
/// resets applied during startup recovery (those are logged only).
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusEvent {
    pub task_id: String,
    pub page_id: String,
    pub story_id: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Counter snapshot for diagnostics. Counters reset when the process does.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStats {
    pub running: bool,
    pub queue_len: usize,
    pub tasks_dispatched: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_retried: u64,
}

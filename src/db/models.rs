use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::types::{IllustrationTask, TaskPriority, TaskStatus};

/// Durable record of one illustration task.
///
/// Superset of the in-memory queue entry: in addition to lifecycle state it
/// carries the composed prompt and the render bookkeeping needed to resume
/// or inspect work after a restart. Timestamps are RFC 3339 strings exactly
/// as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedIllustrationTask {
    pub id: String,
    pub page_id: String,
    pub story_id: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// 1-based position of the page within its story.
    pub page_number: u32,
    pub total_pages: u32,
    /// Composed generation prompt for this page.
    pub description: String,
    pub previous_illustration_path: Option<String>,
    /// Where the finished illustration landed; set when status is ready.
    pub output_path: Option<String>,
    /// Last generation failure; cleared when the task re-enters pending.
    pub error_message: Option<String>,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl PersistedIllustrationTask {
    /// Rebuild the in-memory queue entry this record mirrors.
    pub fn to_task(&self) -> IllustrationTask {
        IllustrationTask {
            id: self.id.clone(),
            page_id: self.page_id.clone(),
            story_id: self.story_id.clone(),
            priority: self.priority,
            status: self.status,
            attempts: self.attempts,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> PersistedIllustrationTask {
        PersistedIllustrationTask {
            id: "task-1".to_string(),
            page_id: "page-1".to_string(),
            story_id: "story-1".to_string(),
            priority: TaskPriority::High,
            status: TaskStatus::Pending,
            page_number: 3,
            total_pages: 12,
            description: "Illustrate page 3 of the story.".to_string(),
            previous_illustration_path: Some("illustrations/page-2.png".to_string()),
            output_path: None,
            error_message: None,
            attempts: 1,
            created_at: "2026-02-01T08:30:00+00:00".to_string(),
            updated_at: "2026-02-01T08:31:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_to_task_mirrors_lifecycle_fields() {
        let record = make_record();
        let task = record.to_task();

        assert_eq!(task.id, record.id);
        assert_eq!(task.page_id, record.page_id);
        assert_eq!(task.story_id, record.story_id);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempts, 1);
        assert_eq!(task.created_at.to_rfc3339(), "2026-02-01T08:30:00+00:00");
    }
}

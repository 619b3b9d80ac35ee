use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncKind {
    Payments,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Payments => "PAYMENTS",
        }
    }
}

/// Counters reported by a finished payment sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub fetched: usize,
    pub created: usize,
    pub already_recorded: usize,
    pub settled: usize,
    pub skipped_unknown_property: usize,
    pub skipped_invalid: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Completed { summary: SyncSummary },
    Failed { error: String },
}

impl JobState {
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub kind: SyncKind,
    #[serde(flatten)]
    pub state: JobState,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub fn queued(kind: SyncKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            state: JobState::Queued,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

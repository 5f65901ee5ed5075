//! Execution records — one per (matching definition, event) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single run of a workflow against a subject. Between advances this is
/// inert data; `next_step_at` is the only thing that brings it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_id: String,
    pub subject_id: String,
    /// Event payload captured at trigger time.
    pub context: serde_json::Value,
    /// Index of the next action to run. Monotonically non-decreasing.
    pub step_index: usize,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    /// Dormant until this time; `now` means resume immediately.
    pub next_step_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// How many times the runner has picked this execution up.
    pub attempts: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl WorkflowExecution {
    /// Fresh execution, due immediately.
    pub fn new(
        workflow_id: &str,
        subject_id: &str,
        context: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            subject_id: subject_id.to_string(),
            context,
            step_index: 0,
            status: ExecutionStatus::Running,
            started_at: now,
            next_step_at: now,
            completed_at: None,
            attempts: 0,
            errors: Vec::new(),
        }
    }

    /// Referrer id captured at trigger time, if the event carried one.
    pub fn referrer_id(&self) -> Option<&str> {
        self.context["referrerId"].as_str()
    }
}

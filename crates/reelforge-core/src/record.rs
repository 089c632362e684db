//! The durable, mutable state associated with a task (`spec.md` §3).

use crate::error::ErrorPayload;
use crate::id::TaskId;
use crate::request::PipelineRequest;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle tag, duplicated onto both `status` and `state` on a
/// `TaskRecord` for client back-compat (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

/// Current/last stage tag (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Sovits,
    Wav2lip,
    Facefusion,
    Completed,
    Failed,
}

/// One append-only progress log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl ProgressEntry {
    pub fn new(message: impl Into<String>, stage: Option<Stage>, extra: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            stage,
            extra,
        }
    }
}

/// Render a timestamp the way `spec.md` §3 requires: ISO-8601 UTC with a
/// literal `Z` suffix (matching `_now_iso` in the original source, which
/// replaces `+00:00` with `Z`).
pub fn to_iso_z(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The durable record for one task (`spec.md` §3). Owned by the Pipeline
/// Engine for the task's lifetime; the Task Store owns its serialized
/// form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub status: Status,
    pub state: Status,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub request: PipelineRequest,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
    #[serde(default)]
    pub intermediate: Option<Map<String, Value>>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl TaskRecord {
    /// Build the initial `queued` record written by `JobManager::submit`.
    pub fn queued(task_id: TaskId, request: PipelineRequest) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: Status::Pending,
            state: Status::Pending,
            stage: Stage::Queued,
            created_at: now,
            updated_at: now,
            request,
            result: None,
            error: None,
            progress: Vec::new(),
            intermediate: None,
            details: Map::new(),
        }
    }

    /// `completed ⇒ result ≠ null ∧ error == null`;
    /// `failed ⇒ error ≠ null` — `spec.md` §3's invariants.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if self.status != self.state {
            return Err("status and state diverged");
        }
        match self.status {
            Status::Completed if self.result.is_none() || self.error.is_some() => {
                Err("completed record must have a result and no error")
            }
            Status::Failed if self.error.is_none() => Err("failed record must have an error"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_record_satisfies_invariants() {
        let record = TaskRecord::queued(TaskId::new(), PipelineRequest::default());
        assert!(record.check_invariants().is_ok());
        assert_eq!(record.status, record.state);
        assert_eq!(record.stage, Stage::Queued);
    }

    #[test]
    fn iso_z_has_trailing_z_not_offset() {
        let s = to_iso_z(Utc::now());
        assert!(s.ends_with('Z'));
        assert!(!s.contains("+00:00"));
    }

    #[test]
    fn stage_serializes_to_spec_tags() {
        assert_eq!(serde_json::to_value(Stage::Wav2lip).unwrap(), "wav2lip");
        assert_eq!(serde_json::to_value(Stage::Facefusion).unwrap(), "facefusion");
        assert_eq!(serde_json::to_value(Status::Completed).unwrap(), "completed");
    }
}
